use crate::model::{
    APOLLO_COMPANY_URL, APOLLO_LINK, LINKEDIN_COMPANY, LINKEDIN_URL, SOCIAL_URLS, WEBSITE,
};
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

/// Category a link is filed under, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkCategory {
    /// Apollo person page
    ApolloPerson,
    /// Apollo organization page
    ApolloCompany,
    /// LinkedIn member profile
    LinkedInProfile,
    /// Any other LinkedIn page, in practice the company page
    LinkedInCompany,
    /// Host on the social allowlist
    Social,
    /// Anything else
    Website,
}

impl LinkCategory {
    /// Every category, in the order their fields appear in a row
    pub const ALL: [LinkCategory; 6] = [
        LinkCategory::ApolloPerson,
        LinkCategory::LinkedInProfile,
        LinkCategory::LinkedInCompany,
        LinkCategory::ApolloCompany,
        LinkCategory::Social,
        LinkCategory::Website,
    ];

    /// Row field this category populates
    pub fn field(&self) -> &'static str {
        match self {
            LinkCategory::ApolloPerson => APOLLO_LINK,
            LinkCategory::ApolloCompany => APOLLO_COMPANY_URL,
            LinkCategory::LinkedInProfile => LINKEDIN_URL,
            LinkCategory::LinkedInCompany => LINKEDIN_COMPANY,
            LinkCategory::Social => SOCIAL_URLS,
            LinkCategory::Website => WEBSITE,
        }
    }

    /// Whether the field keeps only the first URL seen
    pub fn is_single_valued(&self) -> bool {
        !matches!(self, LinkCategory::Social | LinkCategory::Website)
    }
}

/// Domains treated as social profiles; subdomains match too
pub const SOCIAL_DOMAINS: [&str; 4] = ["facebook.com", "twitter.com", "x.com", "instagram.com"];

lazy_static! {
    static ref APOLLO_PERSON: Regex = Regex::new(r"^https://app\.apollo\.io/#/people/").unwrap();
    static ref APOLLO_COMPANY: Regex =
        Regex::new(r"^https://app\.apollo\.io/#/organizations/").unwrap();
    static ref LINKEDIN_PROFILE: Regex =
        Regex::new(r"(?i)^https?://(www\.)?linkedin\.com/in/").unwrap();
}

/// Classify a single URL. The first matching rule wins.
pub fn classify_url(url: &str) -> LinkCategory {
    if APOLLO_PERSON.is_match(url) {
        return LinkCategory::ApolloPerson;
    }
    if APOLLO_COMPANY.is_match(url) {
        return LinkCategory::ApolloCompany;
    }
    if LINKEDIN_PROFILE.is_match(url) {
        return LinkCategory::LinkedInProfile;
    }

    let host = host_of(url);
    if let Some(host) = &host
        && domain_matches(host, "linkedin.com")
    {
        return LinkCategory::LinkedInCompany;
    }
    if let Some(host) = &host
        && SOCIAL_DOMAINS.iter().any(|d| domain_matches(host, d))
    {
        return LinkCategory::Social;
    }

    LinkCategory::Website
}

/// Lowercased host of an absolute URL
fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// `host` is `domain` or one of its subdomains
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apollo_links() {
        assert_eq!(
            classify_url("https://app.apollo.io/#/people/5f1c2"),
            LinkCategory::ApolloPerson
        );
        assert_eq!(
            classify_url("https://app.apollo.io/#/organizations/61aa"),
            LinkCategory::ApolloCompany
        );
        // Other Apollo pages are not profile links
        assert_eq!(
            classify_url("https://app.apollo.io/#/settings"),
            LinkCategory::Website
        );
    }

    #[test]
    fn test_profile_wins_over_company_domain() {
        let url = "https://www.linkedin.com/in/jane-doe";
        assert_eq!(classify_url(url), LinkCategory::LinkedInProfile);
        assert_eq!(classify_url("http://linkedin.com/in/jane"), LinkCategory::LinkedInProfile);
        assert_eq!(
            classify_url("https://www.linkedin.com/company/acme"),
            LinkCategory::LinkedInCompany
        );
    }

    #[test]
    fn test_social_allowlist_matches_hosts() {
        assert_eq!(classify_url("https://facebook.com/acme"), LinkCategory::Social);
        assert_eq!(classify_url("https://www.instagram.com/acme"), LinkCategory::Social);
        assert_eq!(classify_url("https://x.com/acme"), LinkCategory::Social);
        assert_eq!(classify_url("https://twitter.com/acme"), LinkCategory::Social);
    }

    #[test]
    fn test_lookalike_hosts_are_websites() {
        assert_eq!(classify_url("https://box.com"), LinkCategory::Website);
        assert_eq!(classify_url("https://notfacebook.com"), LinkCategory::Website);
        assert_eq!(classify_url("https://acme.io"), LinkCategory::Website);
    }

    #[test]
    fn test_classification_is_stable() {
        let urls = [
            "https://app.apollo.io/#/people/1",
            "https://www.linkedin.com/in/a",
            "https://www.linkedin.com/company/b",
            "https://facebook.com/c",
            "https://d.com",
        ];
        for url in urls {
            assert_eq!(classify_url(url), classify_url(url));
        }
    }

    #[test]
    fn test_single_valued_categories() {
        assert!(LinkCategory::ApolloPerson.is_single_valued());
        assert!(LinkCategory::LinkedInCompany.is_single_valued());
        assert!(!LinkCategory::Social.is_single_valued());
        assert!(!LinkCategory::Website.is_single_valued());
        assert_eq!(LinkCategory::Website.field(), "Website");

        let fields: Vec<_> = LinkCategory::ALL.iter().map(|c| c.field()).collect();
        assert_eq!(fields, crate::model::CLASSIFIED_FIELDS);
    }
}
