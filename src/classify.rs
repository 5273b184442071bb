//! Routing tags (`uni`, `corpus`) inferred from site codes, domains and the
//! kb slug. Rules are ordered lists and the first match wins, so the result
//! never depends on hash iteration order.

use serde::{Deserialize, Serialize};
use url::Url;

pub const UNKNOWN_UNI: &str = "unknown";
pub const OFFICIAL_CORPUS: &str = "official";
pub const COMMUNITY_CORPUS: &str = "community";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRule {
    pub site: String,
    pub uni: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRule {
    pub domain: String,
    pub uni: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    /// Known site codes and the institution each belongs to.
    pub sites: Vec<SiteRule>,
    /// Institution domains; a host matches when it is the domain or a subdomain of it.
    pub domains: Vec<DomainRule>,
    pub community_sites: Vec<String>,
    pub community_domains: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        let pairs = |items: &[(&str, &str)]| -> Vec<(String, String)> {
            items
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect()
        };
        let sites = pairs(&[
            ("oxford", "oxford"),
            ("ox", "oxford"),
            ("cambridge", "cambridge"),
            ("cam", "cambridge"),
            ("ucl", "ucl"),
            ("imperial", "imperial"),
            ("lse", "lse"),
            ("kcl", "kcl"),
            ("edinburgh", "edinburgh"),
            ("manchester", "manchester"),
        ]);
        let domains = pairs(&[
            ("ox.ac.uk", "oxford"),
            ("cam.ac.uk", "cambridge"),
            ("ucl.ac.uk", "ucl"),
            ("imperial.ac.uk", "imperial"),
            ("lse.ac.uk", "lse"),
            ("kcl.ac.uk", "kcl"),
            ("ed.ac.uk", "edinburgh"),
            ("manchester.ac.uk", "manchester"),
        ]);
        Self {
            sites: sites
                .into_iter()
                .map(|(site, uni)| SiteRule { site, uni })
                .collect(),
            domains: domains
                .into_iter()
                .map(|(domain, uni)| DomainRule { domain, uni })
                .collect(),
            community_sites: vec!["tsr".into(), "reddit".into(), "studentroom".into()],
            community_domains: vec![
                "thestudentroom.co.uk".into(),
                "reddit.com".into(),
                "quora.com".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub uni: String,
    pub corpus: String,
}

impl ClassifierRules {
    pub fn classify(&self, site: &str, canonical_url: &str, kb_slug: &str) -> Classification {
        let site = site.trim().to_lowercase();
        let host = host_of(canonical_url);
        let kb_slug = kb_slug.to_lowercase();

        let uni = self
            .sites
            .iter()
            .find(|r| !site.is_empty() && r.site.eq_ignore_ascii_case(&site))
            .map(|r| r.uni.as_str())
            .or_else(|| {
                self.domains
                    .iter()
                    .find(|r| host_matches(&host, &r.domain))
                    .map(|r| r.uni.as_str())
            })
            .or_else(|| self.uni_from_slug(&kb_slug))
            .unwrap_or(UNKNOWN_UNI);

        let community = self
            .community_sites
            .iter()
            .any(|s| !site.is_empty() && s.eq_ignore_ascii_case(&site))
            || self
                .community_domains
                .iter()
                .any(|d| host_matches(&host, d));

        Classification {
            uni: uni.to_string(),
            corpus: if community {
                COMMUNITY_CORPUS
            } else {
                OFFICIAL_CORPUS
            }
            .to_string(),
        }
    }

    /// First institution code (in rule order) that appears in the slug.
    fn uni_from_slug(&self, kb_slug: &str) -> Option<&str> {
        if kb_slug.is_empty() {
            return None;
        }
        self.sites
            .iter()
            .map(|r| r.uni.as_str())
            .chain(self.domains.iter().map(|r| r.uni.as_str()))
            .find(|uni| !uni.is_empty() && kb_slug.contains(&uni.to_lowercase()))
    }
}

fn host_of(canonical_url: &str) -> String {
    Url::parse(canonical_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    if host.is_empty() || domain.is_empty() {
        return false;
    }
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(site: &str, url: &str, slug: &str) -> Classification {
        ClassifierRules::default().classify(site, url, slug)
    }

    #[test]
    fn site_allowlist_wins() {
        let c = classify("CAM", "https://www.ox.ac.uk/admissions", "kb");
        assert_eq!(c.uni, "cambridge");
        assert_eq!(c.corpus, OFFICIAL_CORPUS);
    }

    #[test]
    fn domain_match_includes_subdomains() {
        assert_eq!(classify("", "https://www.ox.ac.uk/fees", "kb").uni, "oxford");
        assert_eq!(classify("", "https://ox.ac.uk/", "kb").uni, "oxford");
        assert_eq!(classify("", "https://maths.ucl.ac.uk/x", "kb").uni, "ucl");
    }

    #[test]
    fn domain_match_respects_labels() {
        assert_eq!(classify("", "https://fox.ac.uk/", "kb").uni, UNKNOWN_UNI);
        assert_eq!(classify("", "https://med.ac.uk/", "kb").uni, UNKNOWN_UNI);
    }

    #[test]
    fn slug_fallback() {
        assert_eq!(classify("", "https://example.com/", "imperial-pg").uni, "imperial");
        assert_eq!(classify("", "https://example.com/", "general").uni, UNKNOWN_UNI);
    }

    #[test]
    fn community_corpus() {
        let c = classify("", "https://www.thestudentroom.co.uk/thread/1", "oxford-ug");
        assert_eq!(c.corpus, COMMUNITY_CORPUS);
        assert_eq!(c.uni, "oxford");
        assert_eq!(classify("tsr", "https://example.com/", "kb").corpus, COMMUNITY_CORPUS);
    }

    #[test]
    fn defaults_for_unparseable_url() {
        let c = classify("", "not a url", "");
        assert_eq!(c.uni, UNKNOWN_UNI);
        assert_eq!(c.corpus, OFFICIAL_CORPUS);
    }

    #[test]
    fn deterministic() {
        let rules = ClassifierRules::default();
        let a = rules.classify("", "https://www.kcl.ac.uk/a", "lse-kb");
        for _ in 0..10 {
            assert_eq!(rules.classify("", "https://www.kcl.ac.uk/a", "lse-kb"), a);
        }
        assert_eq!(a.uni, "kcl");
    }
}
