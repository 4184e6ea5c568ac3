//! Job status machine and job types

use crate::discovery::DiscoverySource;
use std::fmt;
use std::str::FromStr;

/// Status of a harvest job
///
/// `Queued -> Running -> {Completed | Failed}`; a queued job may also be
/// failed directly when it is cancelled by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the status machine allows moving to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Queued, Self::Running, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// What a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    /// Every discovery source followed by a full drain
    Full,
    Search,
    Associations,
    Directories,
}

impl JobType {
    /// Returns the discovery sources this job type runs, in phase order
    pub fn sources(&self) -> &'static [DiscoverySource] {
        match self {
            Self::Full => &[
                DiscoverySource::Search,
                DiscoverySource::Associations,
                DiscoverySource::Directories,
            ],
            Self::Search => &[DiscoverySource::Search],
            Self::Associations => &[DiscoverySource::Associations],
            Self::Directories => &[DiscoverySource::Directories],
        }
    }

    /// Returns true if the job runs the given source
    pub fn runs(&self, source: DiscoverySource) -> bool {
        self.sources().contains(&source)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Search => "search",
            Self::Associations => "associations",
            Self::Directories => "directories",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "search" => Some(Self::Search),
            "associations" => Some(Self::Associations),
            "directories" => Some(Self::Directories),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Full, Self::Search, Self::Associations, Self::Directories]
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_string(&s.to_ascii_lowercase()).ok_or_else(|| {
            format!(
                "unknown job type '{}' (expected full, search, associations or directories)",
                s
            )
        })
    }
}
