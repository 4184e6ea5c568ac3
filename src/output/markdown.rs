//! Markdown summary generation
//!
//! This module generates a human-readable markdown report of a harvest:
//! frontier and contact totals, contacts per country and region, recent
//! contacts and the job table.

use crate::output::HarvestSummary;
use crate::state::UrlStatus;
use crate::Result;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary to `output_path`
pub fn generate_markdown_summary(summary: &HarvestSummary, output_path: &Path) -> Result<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Escapes a value for a markdown table cell
fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// Formats a harvest summary as markdown
pub fn format_markdown_summary(summary: &HarvestSummary) -> String {
    let stats = &summary.stats;
    let mut md = String::new();

    md.push_str("# Cattle Harvest Summary\n\n");
    md.push_str(&format!("- **Generated**: {}\n", summary.generated_at));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Contacts**: {}\n", stats.total_contacts));
    md.push_str(&format!("- **URLs Discovered**: {}\n", stats.total_urls()));
    md.push_str(&format!("- **Queries Executed**: {}\n", stats.queries_executed));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n\n", stats.success_rate()));

    md.push_str("| URL Status | Count |\n");
    md.push_str("|------------|-------|\n");
    for status in UrlStatus::all() {
        md.push_str(&format!("| {} | {} |\n", status, stats.urls(status)));
    }
    md.push('\n');

    if !stats.contacts_by_region.is_empty() {
        let mut by_country: BTreeMap<&str, Vec<(&str, u64)>> = BTreeMap::new();
        for (country, region, count) in &stats.contacts_by_region {
            by_country
                .entry(country.as_str())
                .or_default()
                .push((region.as_str(), *count));
        }

        md.push_str("## Contacts by Country\n\n");
        for (country, regions) in by_country {
            let total: u64 = regions.iter().map(|(_, n)| n).sum();
            md.push_str(&format!("### {} ({} contacts)\n\n", country, total));
            md.push_str("| Region | Contacts |\n");
            md.push_str("|--------|----------|\n");
            for (region, count) in regions {
                let region = if region.is_empty() { "(unknown)" } else { region };
                md.push_str(&format!("| {} | {} |\n", cell(region), count));
            }
            md.push('\n');
        }
    }

    if !summary.recent_contacts.is_empty() {
        md.push_str("## Recent Contacts\n\n");
        md.push_str("| Email | Farm | Region | Source |\n");
        md.push_str("|-------|------|--------|--------|\n");
        for record in &summary.recent_contacts {
            let contact = &record.contact;
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                cell(&contact.email),
                cell(contact.farm_name.as_deref().unwrap_or("")),
                cell(contact.region.as_deref().unwrap_or("")),
                cell(&contact.source_url)
            ));
        }
        md.push('\n');
    }

    if !summary.jobs.is_empty() {
        md.push_str("## Jobs\n\n");
        md.push_str("| ID | Type | Country | Status | Queries | URLs | Processed | Emails | Error |\n");
        md.push_str("|----|------|---------|--------|---------|------|-----------|--------|-------|\n");
        for job in &summary.jobs {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {}/{} | {} | {} | {} | {} |\n",
                job.id,
                job.job_type,
                job.country,
                job.status,
                job.query_index,
                job.total_queries,
                job.urls_discovered,
                job.urls_processed,
                job.emails_found,
                cell(job.error.as_deref().unwrap_or(""))
            ));
        }
        md.push('\n');
    }

    if !stats.recent_failures.is_empty() {
        md.push_str("## Recent Failures\n\n");
        md.push_str("| URL | Reason |\n");
        md.push_str("|-----|--------|\n");
        for (url, reason) in &stats.recent_failures {
            md.push_str(&format!("| {} | {} |\n", cell(url), cell(reason)));
        }
        md.push('\n');
    }

    md
}
