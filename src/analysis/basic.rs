//! Built-in heuristic analyzer
//!
//! Scores the categories that can be judged from markup alone: technical
//! SEO, content structure, structured data, performance, multimedia, social
//! tags and local SEO. Each category adds up detail scores to at most 100.

use crate::analysis::types::{
    AnalysisError, Analyzer, Category, CategoryResult, Detail, PageAnalysis,
};
use crate::crawler::PageData;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

const LOCAL_BUSINESS_TYPES: &[&str] = &[
    "LocalBusiness",
    "Restaurant",
    "Store",
    "Hotel",
    "MedicalBusiness",
    "ProfessionalService",
    "HomeAndConstructionBusiness",
    "LegalService",
    "RealEstateAgent",
    "TravelAgency",
    "FinancialService",
];

const ARTICLE_TYPES: &[&str] = &["Article", "BlogPosting", "NewsArticle", "TechArticle"];

const OG_REQUIRED: &[&str] = &["og:title", "og:description", "og:image", "og:url"];

const SOCIAL_HOSTS: &[&str] = &[
    "twitter.com",
    "x.com",
    "facebook.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
];

/// Markup-only analyzer used by the command line tool
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAnalyzer;

impl Analyzer for BasicAnalyzer {
    fn analyze(&self, page: &PageData) -> Result<PageAnalysis, AnalysisError> {
        let schemas = SchemaIndex::new(&page.structured_data);
        let mut analysis = PageAnalysis::default();

        analysis.insert(Category::Seo, seo(page));
        analysis.insert(Category::Content, content(page));
        analysis.insert(Category::StructuredData, structured_data(&schemas));
        analysis.insert(Category::Performance, performance(page));
        analysis.insert(Category::Multimedia, multimedia(page));
        analysis.insert(Category::Social, social(page));

        let (local, is_local_business) = local_seo(page, &schemas);
        analysis.insert(Category::LocalSeo, local);
        analysis.is_local_business = is_local_business;

        Ok(analysis)
    }
}

/// JSON-LD objects flattened out of `@graph` containers
struct SchemaIndex<'a> {
    objects: Vec<&'a Value>,
}

impl<'a> SchemaIndex<'a> {
    fn new(blocks: &'a [Value]) -> Self {
        let mut objects = Vec::new();
        for block in blocks {
            objects.push(block);
            if let Some(Value::Array(graph)) = block.get("@graph") {
                objects.extend(graph.iter());
            }
        }
        Self { objects }
    }

    fn types_of(value: &Value) -> Vec<&str> {
        match value.get("@type") {
            Some(Value::String(t)) => vec![t.as_str()],
            Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    fn types(&self) -> BTreeSet<&str> {
        self.objects
            .iter()
            .flat_map(|obj| Self::types_of(obj))
            .collect()
    }

    fn find_any(&self, wanted: &[&str]) -> Option<&'a Value> {
        self.objects
            .iter()
            .copied()
            .find(|obj| Self::types_of(obj).iter().any(|t| wanted.contains(t)))
    }

    fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn length_detail(len: usize, good: usize, ok: usize, full: f64, what: &str) -> Detail {
    let (score, recommendation) = if len == 0 {
        (0.0, format!("No {} is set.", what))
    } else if len <= good {
        (full, format!("The {} length is good.", what))
    } else if len <= ok {
        (full * 0.7, format!("The {} is slightly long; keep it within {} characters.", what, good))
    } else {
        (full * 0.5, format!("The {} is too long; keep it within {} characters.", what, good))
    };
    Detail::new(score, recommendation).with("length", len)
}

fn seo(page: &PageData) -> CategoryResult {
    let mut details = BTreeMap::new();

    let title_len = page.title.as_deref().map(|t| t.chars().count()).unwrap_or(0);
    details.insert("title".to_string(), length_detail(title_len, 60, 70, 20.0, "title"));

    let description_len = page
        .meta_content("description")
        .map(|d| d.chars().count())
        .unwrap_or(0);
    details.insert(
        "metaDescription".to_string(),
        length_detail(description_len, 160, 200, 20.0, "meta description"),
    );

    let h1: Vec<&str> = page.headings_at(1).map(|h| h.text.as_str()).collect();
    let (score, recommendation) = match h1.len() {
        1 => (20.0, "The page has exactly one H1."),
        0 => (0.0, "No H1 heading is set."),
        _ => (10.0, "Use only one H1 per page."),
    };
    details.insert(
        "h1".to_string(),
        Detail::new(score, recommendation)
            .with("count", h1.len())
            .with("text", h1.clone()),
    );

    details.insert(
        "canonical".to_string(),
        match &page.canonical {
            Some(c) => Detail::new(10.0, "A canonical URL is set.").with("value", c.as_str()),
            None => Detail::new(0.0, "Set a canonical URL."),
        },
    );

    let found = OG_REQUIRED
        .iter()
        .filter(|tag| page.meta_content(tag).is_some())
        .count();
    details.insert(
        "ogp".to_string(),
        Detail::new(
            found as f64 / OG_REQUIRED.len() as f64 * 15.0,
            if found == OG_REQUIRED.len() {
                "All required Open Graph tags are set."
            } else {
                "Set og:title, og:description, og:image and og:url."
            },
        )
        .with("found", found)
        .with("required", OG_REQUIRED.len()),
    );

    details.insert(
        "mobileOptimization".to_string(),
        match page.meta_content("viewport") {
            Some(_) => Detail::new(10.0, "A viewport meta tag is set."),
            None => Detail::new(0.0, "Add a viewport meta tag for mobile devices."),
        },
    );

    details.insert(
        "lang".to_string(),
        match &page.lang {
            Some(lang) => Detail::new(5.0, "The document language is declared.").with("value", lang.as_str()),
            None => Detail::new(0.0, "Declare the document language on <html>."),
        },
    );

    CategoryResult::from_details(details)
}

fn content(page: &PageData) -> CategoryResult {
    let mut details = BTreeMap::new();

    let words = page.word_count();
    let score = match words {
        w if w >= 1500 => 30.0,
        w if w >= 800 => 22.0,
        w if w >= 300 => 15.0,
        0 => 0.0,
        _ => 5.0,
    };
    details.insert(
        "wordCount".to_string(),
        Detail::new(score, "Longer, focused text is easier to cite.").with("value", words),
    );

    let h2 = page.headings_at(2).count();
    details.insert(
        "headingStructure".to_string(),
        Detail::new(
            match h2 {
                0 => 0.0,
                1 | 2 => 15.0,
                _ => 25.0,
            },
            "Break the content into sections with H2 headings.",
        )
        .with("h2Count", h2),
    );

    let hierarchy = page.headings_at(1).next().is_some() && h2 > 0;
    details.insert(
        "headingHierarchy".to_string(),
        Detail::new(
            if hierarchy { 10.0 } else { 0.0 },
            "Use an H1 followed by H2 sections.",
        ),
    );

    let internal = page.links.iter().filter(|l| l.is_internal).count();
    details.insert(
        "internalLinks".to_string(),
        Detail::new(
            match internal {
                0 => 0.0,
                1..=2 => 5.0,
                3..=9 => 12.0,
                _ => 20.0,
            },
            "Link related pages on the site.",
        )
        .with("count", internal),
    );

    let questions = page
        .headings
        .iter()
        .filter(|h| h.text.trim_end().ends_with('?'))
        .count();
    details.insert(
        "questionHeadings".to_string(),
        Detail::new(
            if questions > 0 { 15.0 } else { 0.0 },
            "Question-style headings help answer engines.",
        )
        .with("count", questions),
    );

    CategoryResult::from_details(details)
}

fn structured_data(schemas: &SchemaIndex) -> CategoryResult {
    let mut details = BTreeMap::new();
    let types = schemas.types();

    details.insert(
        "implementation".to_string(),
        if schemas.is_empty() {
            Detail::new(0.0, "No JSON-LD structured data was found.")
        } else {
            Detail::new(20.0, "JSON-LD structured data is present.")
        },
    );
    details.insert(
        "schemaTypes".to_string(),
        Detail::new(
            (types.len() as f64 * 10.0).min(20.0),
            "Describe the page with more than one schema type.",
        )
        .with("types", types.iter().map(|t| t.to_string()).collect::<Vec<_>>()),
    );

    let flag = |present: bool, points: f64, recommendation: &str| {
        Detail::new(if present { points } else { 0.0 }, recommendation)
    };
    details.insert(
        "faq".to_string(),
        flag(types.contains("FAQPage"), 15.0, "Add FAQPage schema for Q&A content."),
    );
    details.insert(
        "article".to_string(),
        flag(
            ARTICLE_TYPES.iter().any(|t| types.contains(t)),
            15.0,
            "Add Article schema to editorial pages.",
        ),
    );

    let organization = schemas.find_any(&["Organization"]).or_else(|| schemas.find_any(LOCAL_BUSINESS_TYPES));
    let org_score = match organization {
        Some(org) if org.get("logo").is_some() => 20.0,
        Some(_) => 15.0,
        None => 0.0,
    };
    details.insert(
        "organization".to_string(),
        Detail::new(org_score, "Add Organization schema with a logo and sameAs links.")
            .with("implemented", organization.is_some()),
    );
    details.insert(
        "breadcrumb".to_string(),
        flag(types.contains("BreadcrumbList"), 10.0, "Add BreadcrumbList schema."),
    );

    CategoryResult::from_details(details)
}

fn performance(page: &PageData) -> CategoryResult {
    let mut details = BTreeMap::new();
    let metrics = page.metrics;

    let load = match metrics.load_time_ms {
        t if t < 1000 => 40.0,
        t if t < 2000 => 28.0,
        t if t < 3000 => 16.0,
        _ => 6.0,
    };
    details.insert(
        "loadTime".to_string(),
        Detail::new(load, "Aim for a response in under one second.").with("value", metrics.load_time_ms),
    );

    let weight = match metrics.html_bytes {
        b if b < 100_000 => 30.0,
        b if b < 300_000 => 20.0,
        b if b < 1_000_000 => 10.0,
        _ => 0.0,
    };
    details.insert(
        "pageWeight".to_string(),
        Detail::new(weight, "Keep the HTML document small.").with("bytes", metrics.html_bytes),
    );

    let images = page.images.len();
    details.insert(
        "imageCount".to_string(),
        Detail::new(
            match images {
                0..=20 => 15.0,
                21..=50 => 8.0,
                _ => 3.0,
            },
            "Lazy-load or trim images on long pages.",
        )
        .with("count", images),
    );

    details.insert(
        "status".to_string(),
        Detail::new(
            if metrics.status == 200 { 15.0 } else { 10.0 },
            "Serve pages directly with HTTP 200.",
        )
        .with("value", metrics.status),
    );

    CategoryResult::from_details(details)
}

fn multimedia(page: &PageData) -> CategoryResult {
    let mut details = BTreeMap::new();
    let total = page.images.len();
    let with_alt = page
        .images
        .iter()
        .filter(|img| img.alt.as_deref().is_some_and(|a| !a.is_empty()))
        .count();
    let rate = if total > 0 {
        with_alt as f64 / total as f64
    } else {
        0.0
    };

    details.insert(
        "imageAlt".to_string(),
        Detail::new(rate * 40.0, format!("{} image(s) lack alt text.", total - with_alt))
            .with("total", total)
            .with("withAlt", with_alt),
    );
    details.insert(
        "images".to_string(),
        Detail::new(if total > 0 { 20.0 } else { 0.0 }, "Illustrate the content with images."),
    );

    let html = page.html.to_ascii_lowercase();
    let video = html.contains("<video")
        || html.contains("youtube.com/embed")
        || html.contains("player.vimeo.com");
    details.insert(
        "video".to_string(),
        Detail::new(if video { 20.0 } else { 0.0 }, "Consider adding video content."),
    );
    details.insert(
        "captions".to_string(),
        Detail::new(
            if html.contains("<figcaption") { 20.0 } else { 0.0 },
            "Caption figures with <figcaption>.",
        ),
    );

    CategoryResult::from_details(details)
}

fn social(page: &PageData) -> CategoryResult {
    let mut details = BTreeMap::new();

    let found = OG_REQUIRED
        .iter()
        .filter(|tag| page.meta_content(tag).is_some())
        .count();
    details.insert(
        "openGraph".to_string(),
        Detail::new(
            found as f64 / OG_REQUIRED.len() as f64 * 40.0,
            "Complete the Open Graph tags for link previews.",
        )
        .with("found", found),
    );

    let twitter = page.meta.keys().filter(|k| k.starts_with("twitter:")).count();
    details.insert(
        "twitterCard".to_string(),
        Detail::new(if twitter > 0 { 30.0 } else { 0.0 }, "Add Twitter Card tags.").with("count", twitter),
    );

    let profiles = page
        .links
        .iter()
        .filter(|link| {
            url::Url::parse(&link.href)
                .ok()
                .and_then(|u| crate::url::site_host(&u))
                .map(|host| SOCIAL_HOSTS.iter().any(|s| host == *s || host.ends_with(&format!(".{}", s))))
                .unwrap_or(false)
        })
        .count();
    details.insert(
        "profileLinks".to_string(),
        Detail::new(
            if profiles > 0 { 30.0 } else { 0.0 },
            "Link the organization's social profiles.",
        )
        .with("count", profiles),
    );

    CategoryResult::from_details(details)
}

fn local_seo(page: &PageData, schemas: &SchemaIndex) -> (CategoryResult, bool) {
    let Some(business) = schemas.find_any(LOCAL_BUSINESS_TYPES) else {
        let mut details = BTreeMap::new();
        details.insert(
            "localBusinessSchema".to_string(),
            Detail::new(0.0, "No LocalBusiness schema; local checks skipped."),
        );
        return (CategoryResult::from_details(details), false);
    };

    let mut details = BTreeMap::new();
    let complete = ["name", "address", "telephone"]
        .iter()
        .all(|key| business.get(key).is_some());
    details.insert(
        "localBusinessSchema".to_string(),
        Detail::new(
            if complete { 40.0 } else { 20.0 },
            "Include name, address and telephone in LocalBusiness schema.",
        )
        .with("complete", complete),
    );

    let hours = business.get("openingHours").is_some()
        || business.get("openingHoursSpecification").is_some();
    details.insert(
        "openingHours".to_string(),
        Detail::new(if hours { 20.0 } else { 0.0 }, "Publish opening hours in the schema."),
    );

    let html = page.html.to_ascii_lowercase();
    let map = html.contains("google.com/maps") || html.contains("maps.google.");
    details.insert(
        "mapEmbed".to_string(),
        Detail::new(if map { 20.0 } else { 0.0 }, "Embed a map of the location."),
    );

    let rating = business.get("aggregateRating").is_some();
    details.insert(
        "aggregateRating".to_string(),
        Detail::new(if rating { 20.0 } else { 0.0 }, "Show an aggregate rating."),
    );

    (CategoryResult::from_details(details), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{parse_page, PageMetrics};
    use url::Url;

    fn analyze(html: &str) -> PageAnalysis {
        let url = Url::parse("https://example.com/").unwrap();
        let metrics = PageMetrics {
            load_time_ms: 500,
            html_bytes: html.len(),
            status: 200,
        };
        BasicAnalyzer
            .analyze(&parse_page(html, &url, metrics))
            .unwrap()
    }

    #[test]
    fn test_bare_page_scores_low_but_succeeds() {
        let analysis = analyze("<html><body></body></html>");
        assert_eq!(analysis.score(Category::Seo), Some(0));
        assert_eq!(analysis.score(Category::StructuredData), Some(0));
        assert_eq!(analysis.score(Category::LocalSeo), Some(0));
        assert!(!analysis.is_local_business);
        assert!(analysis.get(Category::Eeat).is_none());
    }

    #[test]
    fn test_h1_detail_records_count() {
        let analysis = analyze("<body><h1>One</h1><h1>Two</h1></body>");
        let h1 = &analysis.get(Category::Seo).unwrap().details["h1"];
        assert_eq!(h1.extra_u64("count"), Some(2));
        assert_eq!(h1.score, 10.0);
    }

    #[test]
    fn test_well_formed_seo_page() {
        let analysis = analyze(
            r#"<html lang="en"><head>
                <title>Example</title>
                <meta name="description" content="An example page.">
                <meta name="viewport" content="width=device-width">
                <meta property="og:title" content="t">
                <meta property="og:description" content="d">
                <meta property="og:image" content="i">
                <meta property="og:url" content="u">
                <link rel="canonical" href="https://example.com/">
            </head><body><h1>Example</h1></body></html>"#,
        );
        assert_eq!(analysis.score(Category::Seo), Some(100));
    }

    #[test]
    fn test_structured_data_types() {
        let analysis = analyze(
            r#"<head><script type="application/ld+json">
                {"@context": "https://schema.org", "@graph": [
                    {"@type": "Organization", "name": "Acme", "logo": "x.png"},
                    {"@type": "FAQPage"},
                    {"@type": "BreadcrumbList"}
                ]}
            </script></head><body></body>"#,
        );
        // implementation 20 + types 20 + faq 15 + organization 20 + breadcrumb 10
        assert_eq!(analysis.score(Category::StructuredData), Some(85));
    }

    #[test]
    fn test_local_business_detected() {
        let analysis = analyze(
            r#"<head><script type="application/ld+json">
                {"@type": ["Restaurant"], "name": "Cafe", "address": "1 Main St",
                 "telephone": "123", "openingHours": "Mo-Fr 09:00-17:00"}
            </script></head><body></body>"#,
        );
        assert!(analysis.is_local_business);
        assert_eq!(analysis.score(Category::LocalSeo), Some(60));
    }

    #[test]
    fn test_multimedia_alt_rate() {
        let analysis = analyze(r#"<body><img src="a.png" alt="A"><img src="b.png"></body>"#);
        let result = analysis.get(Category::Multimedia).unwrap();
        assert_eq!(result.details["imageAlt"].score, 20.0);
        assert_eq!(result.score, 40);
    }

    #[test]
    fn test_social_profile_links() {
        let analysis = analyze(
            r#"<head><meta name="twitter:card" content="summary"></head>
               <body><a href="https://www.linkedin.com/company/acme">in</a></body>"#,
        );
        assert_eq!(analysis.score(Category::Social), Some(60));
    }
}
