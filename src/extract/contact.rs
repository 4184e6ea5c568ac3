//! Contact extraction from HTML pages
//!
//! Structured data (JSON-LD) is read first, then regexes run over the
//! visible text. Everything here is pure and tolerates malformed markup.

use crate::crawler::visible_text;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;

const JUNK_EMAIL_DOMAINS: &[&str] = &[
    // Platforms and assets
    "example.com",
    "sentry.io",
    "wixpress.com",
    "googleapis.com",
    "w3.org",
    "schema.org",
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "google.com",
    "googleusercontent.com",
    "gstatic.com",
    "cloudflare.com",
    "jquery.com",
    "wordpress.com",
    "wp.com",
    "gravatar.com",
    "bootstrapcdn.com",
    "squarespace.com",
    "shopify.com",
    "wix.com",
    "godaddy.com",
    "mailchimp.com",
    "constantcontact.com",
    "hubspot.com",
    "salesforce.com",
    "zendesk.com",
    "intercom.io",
    "typeform.com",
    "calendly.com",
    // News and media
    "nytimes.com",
    "washingtonpost.com",
    "cnn.com",
    "bbc.com",
    "bbc.co.uk",
    "reuters.com",
    "apnews.com",
    "usatoday.com",
    "denverpost.com",
    "westword.com",
    "yahoo.com",
    "msn.com",
    // Government
    "state.co.us",
    "state.tx.us",
    "state.mn.us",
];

/// Anchored at the start of the address
const JUNK_EMAIL_PATTERNS: &[&str] = &[
    r".*\.png$",
    r".*\.jpg$",
    r".*\.gif$",
    r".*\.svg$",
    r"noreply@",
    r"no-reply@",
    r"donotreply@",
    r"webmaster@",
    r"postmaster@",
    r"mailer-daemon@",
    r".*@.*\.gov$",
    r".*@.*\.gov\.\w+$",
    r".*@.*\.edu$",
    r".*@.*state\.\w{2}\.us$",
    r"editor@",
    r"press@",
    r"marketing@",
    r"advertising@",
    r"hr@",
    r"careers@",
    r"jobs@",
    r"recruitment@",
    r"legal@",
    r"compliance@",
    r"privacy@",
    r"newsletter@",
    r"subscribe@",
    r"unsubscribe@",
    r"abuse@",
    r"spam@",
    r"security@",
    r"root@",
    r"admin@",
    r"administrator@",
    r"hostmaster@",
    r"billing@",
    r"accounts@",
    r"payments@",
];

const STATE_ABBREVS: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY",
];

const STATE_NAMES: &[&str] = &[
    "Alabama", "Alaska", "Arizona", "Arkansas", "California", "Colorado", "Connecticut",
    "Delaware", "Florida", "Georgia", "Hawaii", "Idaho", "Illinois", "Indiana", "Iowa",
    "Kansas", "Kentucky", "Louisiana", "Maine", "Maryland", "Massachusetts", "Michigan",
    "Minnesota", "Mississippi", "Missouri", "Montana", "Nebraska", "Nevada", "New Hampshire",
    "New Jersey", "New Mexico", "New York", "North Carolina", "North Dakota", "Ohio",
    "Oklahoma", "Oregon", "Pennsylvania", "Rhode Island", "South Carolina", "South Dakota",
    "Tennessee", "Texas", "Utah", "Vermont", "Virginia", "Washington", "West Virginia",
    "Wisconsin", "Wyoming",
];

const TITLE_SUFFIXES: &[&str] = &[
    " - Home",
    " | Home",
    " - Contact",
    " | Contact",
    " - About",
    " | About",
    " \u{2013} Home",
    " \u{2013} Contact",
];

const SCHEMA_BUSINESS_TYPES: &[&str] =
    &["LocalBusiness", "Farm", "Organization", "AnimalShelter", "Store"];

const MAX_NAME_LEN: usize = 100;

/// Contact details found on one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactCandidate {
    pub farm_name: Option<String>,
    pub owner_name: Option<String>,
    /// Lowercased, junk-filtered, in discovery order
    pub emails: Vec<String>,
    /// Normalized to `(xxx) xxx-xxxx`
    pub phones: Vec<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub website: Option<String>,
    /// Facebook then Instagram profile links
    pub social_links: Vec<String>,
    pub source_url: String,
}

impl ContactCandidate {
    /// Adds emails and fills blank location fields from a second page
    pub fn merge_from(&mut self, other: ContactCandidate) {
        for email in other.emails {
            if !self.emails.contains(&email) {
                self.emails.push(email);
            }
        }
        if self.phones.is_empty() {
            self.phones = other.phones;
        }
        fill(&mut self.address, other.address);
        fill(&mut self.city, other.city);
        fill(&mut self.region, other.region);
        fill(&mut self.postal_code, other.postal_code);
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex is valid"))
        }
    };
}

macro_rules! static_selector {
    ($name:ident, $css:expr) => {
        fn $name() -> &'static Selector {
            static SEL: OnceLock<Selector> = OnceLock::new();
            SEL.get_or_init(|| Selector::parse($css).expect("static CSS selector is valid"))
        }
    };
}

static_regex!(email_re, r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}");
static_regex!(
    email_full_re,
    r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$"
);
static_regex!(
    phone_re,
    r"(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}"
);
static_regex!(zip_re, r"\b\d{5}(?:-\d{4})?\b");
static_regex!(
    address_re,
    r"(?i)\d{1,6}\s+(?:[NSEW]\.?\s+)?\w+(?:\s+\w+){0,4}\s+(?:Street|St|Avenue|Ave|Road|Rd|Drive|Dr|Lane|Ln|Boulevard|Blvd|Way|Court|Ct|Highway|Hwy|Route|Rt|County\s+Road|CR|Farm\s+Road|FM)\.?(?:[,\s]+[\w\s]+){0,3}"
);
static_regex!(
    owner_re,
    r"(?i:owned\s+(?:and\s+)?operated\s+by|owner[s]?:?\s*|contact[s]?:?\s*|manager:?\s*|proprietor:?\s*)\s*([A-Z][a-z]+\s+(?:[A-Z]\.?\s+)?[A-Z][a-z]+)"
);
static_regex!(
    family_owner_re,
    r"(?i:family[\s-]+owned|run\s+by|managed\s+by)\s+(?:by\s+)?([A-Z][a-z]+\s+(?:[A-Z]\.?\s+)?[A-Z][a-z]+)"
);

static_selector!(ld_json_sel, r#"script[type="application/ld+json"]"#);
static_selector!(link_sel, "a[href]");
static_selector!(title_sel, "title");
static_selector!(h1_sel, "h1");
static_selector!(og_site_name_sel, r#"meta[property="og:site_name"]"#);
static_selector!(og_url_sel, r#"meta[property="og:url"]"#);
static_selector!(canonical_sel, r#"link[rel="canonical"]"#);

fn junk_email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!("^(?:{})", JUNK_EMAIL_PATTERNS.join("|"));
        Regex::new(&pattern).expect("static junk email patterns are valid")
    })
}

fn state_zip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"\b({})\b\s*\d{{5}}", STATE_ABBREVS.join("|"));
        Regex::new(&pattern).expect("static state pattern is valid")
    })
}

fn title_state_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let states: Vec<&str> = STATE_ABBREVS.iter().chain(STATE_NAMES).copied().collect();
        let pattern = format!(r"(?i)\s*[-\x{{2013}}|]\s*(?:{})\s*$", states.join("|"));
        Regex::new(&pattern).expect("static title pattern is valid")
    })
}

/// Returns true if an address looks like a real contact email
pub fn is_valid_email(email: &str) -> bool {
    if !email_full_re().is_match(email) {
        return false;
    }
    let domain = match email.rsplit_once('@') {
        Some((_, domain)) => domain,
        None => return false,
    };
    if JUNK_EMAIL_DOMAINS.contains(&domain) {
        return false;
    }
    !junk_email_re().is_match(email)
}

/// Normalizes a US phone number to `(xxx) xxx-xxxx`
///
/// A leading country code 1 is dropped; anything but ten digits is rejected.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }
    if digits.len() != 10 {
        return None;
    }
    Some(format!(
        "({}) {}-{}",
        &digits[..3],
        &digits[3..6],
        &digits[6..]
    ))
}

/// Finds the first email address in free text
pub fn find_email(text: &str) -> Option<String> {
    email_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .find(|email| is_valid_email(email))
}

/// Extracts contact details from a page
#[derive(Debug, Default, Clone, Copy)]
pub struct ContactExtractor;

impl ContactExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts every contact detail the page exposes
    pub fn extract(&self, html: &str, source_url: &str) -> ContactCandidate {
        let document = Html::parse_document(html);
        let mut contact = ContactCandidate {
            source_url: source_url.to_string(),
            ..Default::default()
        };

        extract_structured_data(&document, &mut contact);

        let text = visible_text(&document);
        extract_emails(&document, &text, &mut contact);
        extract_phones(&text, &mut contact);
        extract_address(&text, &mut contact);
        extract_social_links(&document, &mut contact);
        extract_farm_name(&document, &mut contact);
        extract_owner_name(&text, &mut contact);
        extract_website(&document, source_url, &mut contact);

        contact
    }
}

fn push_email(contact: &mut ContactCandidate, raw: &str) {
    let email = raw.trim().to_lowercase();
    if is_valid_email(&email) && !contact.emails.contains(&email) {
        contact.emails.push(email);
    }
}

fn push_phone(contact: &mut ContactCandidate, raw: &str) {
    if let Some(phone) = normalize_phone(raw) {
        if !contact.phones.contains(&phone) {
            contact.phones.push(phone);
        }
    }
}

fn extract_structured_data(document: &Html, contact: &mut ContactCandidate) {
    for script in document.select(ld_json_sel()) {
        let raw: String = script.text().collect();
        let data: Value = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(_) => continue,
        };
        match data {
            Value::Array(items) => items.iter().for_each(|item| parse_schema_item(item, contact)),
            item @ Value::Object(_) => parse_schema_item(&item, contact),
            _ => {}
        }
    }
}

fn schema_type_matches(item: &Value) -> bool {
    match item.get("@type") {
        Some(Value::String(t)) => SCHEMA_BUSINESS_TYPES.contains(&t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| SCHEMA_BUSINESS_TYPES.contains(&t)),
        _ => false,
    }
}

fn parse_schema_item(item: &Value, contact: &mut ContactCandidate) {
    if !schema_type_matches(item) {
        return;
    }
    let field = |value: &Value, key: &str| value.get(key).and_then(Value::as_str).and_then(non_empty);

    if contact.farm_name.is_none() {
        contact.farm_name = field(item, "name");
    }
    if let Some(email) = field(item, "email") {
        let email = email.trim_start_matches("mailto:").to_string();
        push_email(contact, &email);
    }
    if let Some(phone) = field(item, "telephone") {
        push_phone(contact, &phone);
    }
    if let Some(address) = item.get("address").filter(|a| a.is_object()) {
        fill(&mut contact.address, field(address, "streetAddress"));
        fill(&mut contact.city, field(address, "addressLocality"));
        fill(&mut contact.region, field(address, "addressRegion"));
        fill(&mut contact.postal_code, field(address, "postalCode"));
    }
    fill(&mut contact.website, field(item, "url"));
}

fn extract_emails(document: &Html, text: &str, contact: &mut ContactCandidate) {
    for link in document.select(link_sel()) {
        let href = link.value().attr("href").unwrap_or("").trim();
        let Some(scheme) = href.get(..7) else {
            continue;
        };
        if scheme.eq_ignore_ascii_case("mailto:") {
            let address = href.get(7..).unwrap_or("").split('?').next().unwrap_or("");
            push_email(contact, address);
        }
    }

    for found in email_re().find_iter(text) {
        push_email(contact, found.as_str());
    }
}

fn extract_phones(text: &str, contact: &mut ContactCandidate) {
    for found in phone_re().find_iter(text) {
        push_phone(contact, found.as_str());
    }
}

fn extract_address(text: &str, contact: &mut ContactCandidate) {
    if contact.address.is_some() {
        return;
    }

    contact.address = address_re().find(text).and_then(|m| non_empty(m.as_str()));

    if contact.postal_code.is_none() {
        contact.postal_code = zip_re().find(text).map(|m| m.as_str().to_string());
    }

    if contact.region.is_none() {
        contact.region = state_zip_re()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
    }
}

fn extract_social_links(document: &Html, contact: &mut ContactCandidate) {
    let mut facebook = None;
    let mut instagram = None;
    for link in document.select(link_sel()) {
        let href = link.value().attr("href").unwrap_or("");
        let lower = href.to_lowercase();
        if lower.contains("facebook.com/") && facebook.is_none() {
            facebook = Some(href.to_string());
        } else if lower.contains("instagram.com/") && instagram.is_none() {
            instagram = Some(href.to_string());
        }
    }
    contact.social_links.extend(facebook);
    contact.social_links.extend(instagram);
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Strips navigation suffixes and a trailing US state from a page title
fn clean_title(title: &str) -> String {
    let mut name = title.trim().to_string();
    for suffix in TITLE_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.to_string();
        }
    }
    title_state_re().replace(&name, "").trim().to_string()
}

fn extract_farm_name(document: &Html, contact: &mut ContactCandidate) {
    if contact.farm_name.is_some() {
        return;
    }

    contact.farm_name = document
        .select(title_sel())
        .next()
        .map(|title| clean_title(&element_text(title)))
        .filter(|name| !name.is_empty() && name.chars().count() < MAX_NAME_LEN);

    if contact.farm_name.is_none() {
        contact.farm_name = document
            .select(og_site_name_sel())
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .and_then(non_empty);
    }

    if contact.farm_name.is_none() {
        contact.farm_name = document
            .select(h1_sel())
            .next()
            .map(element_text)
            .filter(|name| !name.is_empty() && name.chars().count() < MAX_NAME_LEN);
    }
}

fn extract_owner_name(text: &str, contact: &mut ContactCandidate) {
    if contact.owner_name.is_some() {
        return;
    }
    contact.owner_name = [owner_re(), family_owner_re()]
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(m.as_str()));
}

fn extract_website(document: &Html, source_url: &str, contact: &mut ContactCandidate) {
    if contact.website.is_some() {
        return;
    }
    contact.website = document
        .select(og_url_sel())
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .and_then(non_empty)
        .or_else(|| {
            document
                .select(canonical_sel())
                .next()
                .and_then(|link| link.value().attr("href"))
                .and_then(non_empty)
        })
        .or_else(|| non_empty(source_url));
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANCH_PAGE: &str = r#"<html><head>
        <title>Lazy K Ranch - Texas</title>
        <meta property="og:url" content="https://lazykranch.com/">
        </head><body>
        <h1>Welcome to Lazy K</h1>
        <p>Owned and operated by Jim Kowalski since 1978.</p>
        <p>Call (512) 555-0142 or 1-512-555-0199.</p>
        <p>1200 County Road 45, Lampasas, TX 76550</p>
        <a href="mailto:Info@LazyKRanch.com?subject=Hello">Email us</a>
        <p>Sales: sales@lazykranch.com | noreply@lazykranch.com</p>
        <a href="https://www.facebook.com/lazykranch">Facebook</a>
        <a href="https://instagram.com/lazyk">Instagram</a>
        </body></html>"#;

    #[test]
    fn test_extract_full_page() {
        let contact = ContactExtractor::new().extract(RANCH_PAGE, "https://lazykranch.com/contact");

        assert_eq!(contact.emails, vec!["info@lazykranch.com", "sales@lazykranch.com"]);
        assert_eq!(contact.phones, vec!["(512) 555-0142", "(512) 555-0199"]);
        assert_eq!(contact.farm_name.as_deref(), Some("Lazy K Ranch"));
        assert_eq!(contact.owner_name.as_deref(), Some("Jim Kowalski"));
        assert_eq!(contact.region.as_deref(), Some("TX"));
        assert_eq!(contact.postal_code.as_deref(), Some("76550"));
        assert!(contact
            .address
            .as_deref()
            .unwrap_or("")
            .starts_with("1200 County Road"));
        assert_eq!(contact.website.as_deref(), Some("https://lazykranch.com/"));
        assert_eq!(contact.social_links.len(), 2);
        assert_eq!(contact.source_url, "https://lazykranch.com/contact");
    }

    #[test]
    fn test_json_ld_business() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type": "LocalBusiness", "name": "Bar S Cattle Co",
             "email": "mailto:Office@BarS.com", "telephone": "+1 406 555 0110",
             "address": {"streetAddress": "55 Ranch Rd", "addressLocality": "Billings",
                         "addressRegion": "Montana", "postalCode": "59101"},
             "url": "https://bars.com"}
            </script></head><body><p>Welcome</p></body></html>"#;
        let contact = ContactExtractor::new().extract(html, "https://bars.com/about");

        assert_eq!(contact.farm_name.as_deref(), Some("Bar S Cattle Co"));
        assert_eq!(contact.emails, vec!["office@bars.com"]);
        assert_eq!(contact.phones, vec!["(406) 555-0110"]);
        assert_eq!(contact.city.as_deref(), Some("Billings"));
        assert_eq!(contact.region.as_deref(), Some("Montana"));
        assert_eq!(contact.address.as_deref(), Some("55 Ranch Rd"));
        assert_eq!(contact.website.as_deref(), Some("https://bars.com"));
    }

    #[test]
    fn test_malformed_json_ld_is_ignored() {
        let html = r#"<script type="application/ld+json">{not json</script><p>hi@ranch.net</p>"#;
        let contact = ContactExtractor::new().extract(html, "https://ranch.net/");
        assert_eq!(contact.emails, vec!["hi@ranch.net"]);
    }

    #[test]
    fn test_non_ascii_href_keeps_page_emails() {
        let html = r#"<p>Email owner@ranch-test.com</p>
            <a href="/abouté-us">About</a>
            <a href="é">x</a>
            <a href="MAILTO:Sales@Ranch-Test.com?subject=Bulls">Sales</a>"#;
        let contact = ContactExtractor::new().extract(html, "https://ranch-test.com/");
        assert_eq!(
            contact.emails,
            vec!["sales@ranch-test.com", "owner@ranch-test.com"]
        );
    }

    #[test]
    fn test_junk_emails() {
        assert!(is_valid_email("owner@ranch.com"));
        assert!(!is_valid_email("someone@example.com"));
        assert!(!is_valid_email("logo@2x.png"));
        assert!(!is_valid_email("webmaster@ranch.com"));
        assert!(!is_valid_email("info@usda.gov"));
        assert!(!is_valid_email("extension@ag.state.tx.us"));
        assert!(!is_valid_email("prof@tamu.edu"));
        assert!(!is_valid_email("not-an-email"));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("512.555.0142").as_deref(), Some("(512) 555-0142"));
        assert_eq!(normalize_phone("+1 (512) 555-0142").as_deref(), Some("(512) 555-0142"));
        assert_eq!(normalize_phone("555-0142"), None);
    }

    #[test]
    fn test_farm_name_fallbacks() {
        let html = r#"<html><head><title></title><meta property="og:site_name" content="Triple R"></head></html>"#;
        let contact = ContactExtractor::new().extract(html, "https://rrr.com/");
        assert_eq!(contact.farm_name.as_deref(), Some("Triple R"));

        let html = r#"<html><body><h1> Hillside Herefords </h1></body></html>"#;
        let contact = ContactExtractor::new().extract(html, "https://hh.com/");
        assert_eq!(contact.farm_name.as_deref(), Some("Hillside Herefords"));
        assert_eq!(contact.website.as_deref(), Some("https://hh.com/"));
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Circle T | Contact"), "Circle T");
        assert_eq!(clean_title("Circle T - Home"), "Circle T");
        assert_eq!(clean_title("Circle T | North Dakota"), "Circle T");
        assert_eq!(clean_title("Circle T \u{2013} Contact"), "Circle T");
    }

    #[test]
    fn test_merge_fills_blanks() {
        let mut first = ContactCandidate {
            phones: vec!["(512) 555-0142".to_string()],
            city: Some("Austin".to_string()),
            ..Default::default()
        };
        let second = ContactCandidate {
            emails: vec!["a@ranch.com".to_string()],
            phones: vec!["(512) 555-0000".to_string()],
            city: Some("Dallas".to_string()),
            region: Some("TX".to_string()),
            ..Default::default()
        };
        first.merge_from(second);

        assert_eq!(first.emails, vec!["a@ranch.com"]);
        assert_eq!(first.phones, vec!["(512) 555-0142"]);
        assert_eq!(first.city.as_deref(), Some("Austin"));
        assert_eq!(first.region.as_deref(), Some("TX"));
    }

    #[test]
    fn test_find_email() {
        assert_eq!(
            find_email("Call or write: noreply@x.com, Beef@Ranch.org"),
            Some("beef@ranch.org".to_string())
        );
        assert_eq!(find_email("nothing"), None);
    }
}
