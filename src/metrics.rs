// 📊 Metric Engine - Diagnostic calculations over crawl exports
// One tagged variant per diagnostic, each a pure count over a dataset.
// Missing data never raises: the outcome says explicitly why a value
// degraded to zero so callers and tests can tell the cases apart.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, DatasetStore};

// Crawl export column headers, exactly as the crawler writes them
pub const COL_ADDRESS: &str = "Address";
pub const COL_STATUS: &str = "Status Code";
pub const COL_INDEXABILITY: &str = "Indexability";
pub const COL_CONTENT_TYPE: &str = "Content Type";
pub const COL_CANONICAL: &str = "Canonical Link Element 1";
pub const COL_META_ROBOTS: &str = "Meta Robots 1";
pub const COL_TITLE: &str = "Title 1";
pub const COL_TITLE_LENGTH: &str = "Title 1 Length";
pub const COL_META_DESCRIPTION: &str = "Meta Description 1";
pub const COL_META_DESCRIPTION_LENGTH: &str = "Meta Description 1 Length";
pub const COL_H1: &str = "H1-1";
pub const COL_H1_SECOND: &str = "H1-2";
pub const COL_ALT_TEXT: &str = "Alt Text";
pub const COL_IMAGE_SIZE: &str = "Size (Bytes)";

// ============================================================================
// CALCULATIONS
// ============================================================================

/// Every diagnostic the audit knows how to compute, one variant per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Calculation {
    // Sitemap
    UrlsNotInSitemap,
    Non200InSitemap,
    NonIndexableInSitemap,
    SitemapTimeoutErrors,
    LargeSitemapFiles,

    // Canonical tags
    MissingCanonical,
    CanonicalisedPages,
    NonIndexableCanonical,
    CanonicalDifferentDomain,
    MissingCanonicalUrls,

    // Crawlability
    PagesWithNoindex,
    PagesWithNofollow,
    ConflictingRobots,
    RobotsTxtBlocked,

    // Page titles
    MissingPageTitles,
    DuplicatePageTitles,
    LongPageTitles,
    ShortPageTitles,

    // Meta descriptions
    MissingMetaDescriptions,
    DuplicateMetaDescriptions,
    LongMetaDescriptions,
    ShortMetaDescriptions,

    // H1 tags
    MissingH1,
    DuplicateH1,
    MultipleH1,

    // Images
    ImagesMissingAlt,
    ImagesOver100kb,
    BrokenImages,

    // Response codes
    Client4xxErrors,
    Server5xxErrors,
    Status404Count,

    // Redirects
    RedirectChains,
    RedirectLoops,
    TemporaryRedirects,
}

/// Result of evaluating one calculation. The degrade-to-zero paths are
/// explicit so the contract is testable without a full dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricOutcome {
    /// The predicate matched this many rows.
    Count(u64),
    /// The source dataset was never loaded; reported as 0.
    MissingDataset,
    /// A required column is absent from the dataset; reported as 0.
    MissingColumn(&'static str),
    /// The rule is declared in the catalog but has no calculation yet;
    /// surfaced in the report instead of a silent 0.
    Unimplemented,
}

impl MetricOutcome {
    /// The number written into the report, or None when the rule has no
    /// calculation and should be flagged instead.
    pub fn reported_value(&self) -> Option<u64> {
        match self {
            MetricOutcome::Count(n) => Some(*n),
            MetricOutcome::MissingDataset | MetricOutcome::MissingColumn(_) => Some(0),
            MetricOutcome::Unimplemented => None,
        }
    }
}

/// Evaluate one rule against the dataset store.
pub fn evaluate(store: &DatasetStore, dataset_name: &str, calc: Calculation) -> MetricOutcome {
    if calc.is_unimplemented() {
        return MetricOutcome::Unimplemented;
    }

    match store.get(dataset_name) {
        Some(dataset) => calc.evaluate(dataset),
        None => MetricOutcome::MissingDataset,
    }
}

impl Calculation {
    /// Rules that exist in the catalog but intentionally have no
    /// calculation. `UrlsNotInSitemap` needs a cross-dataset comparison
    /// whose intent was never confirmed; the others were declared ahead
    /// of their implementations.
    pub fn is_unimplemented(&self) -> bool {
        matches!(
            self,
            Calculation::UrlsNotInSitemap
                | Calculation::SitemapTimeoutErrors
                | Calculation::LargeSitemapFiles
                | Calculation::NonIndexableCanonical
                | Calculation::MissingCanonicalUrls
                | Calculation::ConflictingRobots
        )
    }

    /// Evaluate against a single dataset. Total: every path yields an
    /// outcome, never an error.
    pub fn evaluate(&self, ds: &Dataset) -> MetricOutcome {
        use Calculation::*;

        match self {
            // ----------------------------------------------------------------
            // Status-code family. A blank or non-numeric status counts as
            // "not 200" in the inequality checks; range checks need a number.
            // ----------------------------------------------------------------
            Non200InSitemap | BrokenImages => {
                count_where_status(ds, |s| s != Some(200.0))
            }
            Client4xxErrors => {
                count_where_status(ds, |s| matches!(s, Some(c) if (400.0..500.0).contains(&c)))
            }
            Server5xxErrors => {
                count_where_status(ds, |s| matches!(s, Some(c) if c >= 500.0))
            }
            Status404Count => count_where_status(ds, |s| s == Some(404.0)),
            TemporaryRedirects => {
                count_where_status(ds, |s| s == Some(302.0) || s == Some(307.0))
            }

            // ----------------------------------------------------------------
            // Missing-field family
            // ----------------------------------------------------------------
            MissingPageTitles => count_missing(ds, COL_TITLE),
            MissingMetaDescriptions => count_missing(ds, COL_META_DESCRIPTION),
            MissingH1 => count_missing(ds, COL_H1),
            ImagesMissingAlt => count_missing(ds, COL_ALT_TEXT),
            MissingCanonical => count_missing_canonical(ds),

            // ----------------------------------------------------------------
            // Duplicate-field family
            // ----------------------------------------------------------------
            DuplicatePageTitles => count_duplicates(ds, COL_TITLE),
            DuplicateMetaDescriptions => count_duplicates(ds, COL_META_DESCRIPTION),
            DuplicateH1 => count_duplicates(ds, COL_H1),

            // ----------------------------------------------------------------
            // Length-threshold family
            // ----------------------------------------------------------------
            LongPageTitles => count_length(ds, COL_TITLE_LENGTH, |len| len > 60.0),
            ShortPageTitles => {
                count_length(ds, COL_TITLE_LENGTH, |len| len > 0.0 && len < 30.0)
            }
            LongMetaDescriptions => {
                count_length(ds, COL_META_DESCRIPTION_LENGTH, |len| len > 160.0)
            }
            ShortMetaDescriptions => {
                count_length(ds, COL_META_DESCRIPTION_LENGTH, |len| len > 0.0 && len < 120.0)
            }

            // ----------------------------------------------------------------
            // Canonical relationships
            // ----------------------------------------------------------------
            CanonicalisedPages => count_canonicalised(ds),
            CanonicalDifferentDomain => count_canonical_cross_domain(ds),

            // ----------------------------------------------------------------
            // Directives and indexability
            // ----------------------------------------------------------------
            PagesWithNoindex => count_contains(ds, COL_META_ROBOTS, "noindex"),
            PagesWithNofollow => count_contains(ds, COL_META_ROBOTS, "nofollow"),
            RobotsTxtBlocked => count_contains(ds, COL_INDEXABILITY, "blocked by robots.txt"),
            NonIndexableInSitemap => match ds.column(COL_INDEXABILITY) {
                Some(col) => MetricOutcome::Count(
                    (0..ds.row_count())
                        .filter(|&row| ds.value(row, col) != Some("Indexable"))
                        .count() as u64,
                ),
                None => MetricOutcome::MissingColumn(COL_INDEXABILITY),
            },

            // ----------------------------------------------------------------
            // Headings and images
            // ----------------------------------------------------------------
            MultipleH1 => match ds.column(COL_H1_SECOND) {
                Some(col) => MetricOutcome::Count(
                    (0..ds.row_count())
                        .filter(|&row| ds.value(row, col).is_some())
                        .count() as u64,
                ),
                None => MetricOutcome::MissingColumn(COL_H1_SECOND),
            },
            ImagesOver100kb => count_length(ds, COL_IMAGE_SIZE, |size| size > 100_000.0),

            // ----------------------------------------------------------------
            // Redirect collections: the dedicated export's row count is the
            // metric, no per-row predicate.
            // ----------------------------------------------------------------
            RedirectChains | RedirectLoops => MetricOutcome::Count(ds.row_count() as u64),

            // Declared-only rules are answered before dataset lookup
            UrlsNotInSitemap
            | SitemapTimeoutErrors
            | LargeSitemapFiles
            | NonIndexableCanonical
            | MissingCanonicalUrls
            | ConflictingRobots => MetricOutcome::Unimplemented,
        }
    }
}

// ============================================================================
// PREDICATE HELPERS
// ============================================================================

fn count_where_status(ds: &Dataset, pred: impl Fn(Option<f64>) -> bool) -> MetricOutcome {
    let Some(col) = ds.column(COL_STATUS) else {
        return MetricOutcome::MissingColumn(COL_STATUS);
    };

    let count = (0..ds.row_count())
        .filter(|&row| pred(ds.number(row, col)))
        .count();
    MetricOutcome::Count(count as u64)
}

/// Rows where the target field is absent or empty.
fn count_missing(ds: &Dataset, column: &'static str) -> MetricOutcome {
    let Some(col) = ds.column(column) else {
        return MetricOutcome::MissingColumn(column);
    };

    let count = (0..ds.row_count())
        .filter(|&row| ds.value(row, col).is_none())
        .count();
    MetricOutcome::Count(count as u64)
}

/// Rows whose non-empty field value occurs more than once. Every
/// occurrence of a repeated value is counted, not just the extras, and
/// empty fields never participate.
fn count_duplicates(ds: &Dataset, column: &'static str) -> MetricOutcome {
    let Some(col) = ds.column(column) else {
        return MetricOutcome::MissingColumn(column);
    };

    let mut occurrences: HashMap<&str, u64> = HashMap::new();
    for row in 0..ds.row_count() {
        if let Some(value) = ds.value(row, col) {
            *occurrences.entry(value).or_insert(0) += 1;
        }
    }

    let count = occurrences.values().filter(|&&n| n > 1).sum();
    MetricOutcome::Count(count)
}

fn count_length(
    ds: &Dataset,
    column: &'static str,
    pred: impl Fn(f64) -> bool,
) -> MetricOutcome {
    let Some(col) = ds.column(column) else {
        return MetricOutcome::MissingColumn(column);
    };

    let count = (0..ds.row_count())
        .filter(|&row| ds.number(row, col).is_some_and(&pred))
        .count();
    MetricOutcome::Count(count as u64)
}

/// Case-insensitive substring match on the target field; absent fields
/// never match.
fn count_contains(ds: &Dataset, column: &'static str, needle: &str) -> MetricOutcome {
    let Some(col) = ds.column(column) else {
        return MetricOutcome::MissingColumn(column);
    };

    let needle = needle.to_lowercase();
    let count = (0..ds.row_count())
        .filter(|&row| {
            ds.value(row, col)
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        })
        .count();
    MetricOutcome::Count(count as u64)
}

/// Pages with no canonical link. When the export carries a content-type
/// column only `text/html` rows are inspected; otherwise every row is.
fn count_missing_canonical(ds: &Dataset) -> MetricOutcome {
    let Some(canonical) = ds.column(COL_CANONICAL) else {
        return MetricOutcome::MissingColumn(COL_CANONICAL);
    };

    let content_type = ds.column(COL_CONTENT_TYPE);
    let count = (0..ds.row_count())
        .filter(|&row| match content_type {
            Some(ct) => ds
                .value(row, ct)
                .is_some_and(|v| v.contains("text/html")),
            None => true,
        })
        .filter(|&row| ds.value(row, canonical).is_none())
        .count();
    MetricOutcome::Count(count as u64)
}

/// Pages whose canonical points somewhere other than the page itself.
fn count_canonicalised(ds: &Dataset) -> MetricOutcome {
    let Some(canonical) = ds.column(COL_CANONICAL) else {
        return MetricOutcome::MissingColumn(COL_CANONICAL);
    };
    let Some(address) = ds.column(COL_ADDRESS) else {
        return MetricOutcome::MissingColumn(COL_ADDRESS);
    };

    let count = (0..ds.row_count())
        .filter(|&row| {
            ds.value(row, canonical)
                .is_some_and(|c| Some(c) != ds.value(row, address))
        })
        .count();
    MetricOutcome::Count(count as u64)
}

/// Pages whose canonical lives on a different domain than the page.
fn count_canonical_cross_domain(ds: &Dataset) -> MetricOutcome {
    let Some(canonical) = ds.column(COL_CANONICAL) else {
        return MetricOutcome::MissingColumn(COL_CANONICAL);
    };
    let Some(address) = ds.column(COL_ADDRESS) else {
        return MetricOutcome::MissingColumn(COL_ADDRESS);
    };

    let count = (0..ds.row_count())
        .filter(|&row| {
            let Some(canonical_url) = ds.value(row, canonical) else {
                return false;
            };
            let canonical_host = host_of(canonical_url);
            let page_host = ds.value(row, address).map(host_of).unwrap_or("");

            !canonical_host.is_empty() && canonical_host != page_host
        })
        .count();
    MetricOutcome::Count(count as u64)
}

/// Network-location component of a URL: everything between `://` and the
/// first path, query or fragment separator. A URL without a scheme has no
/// network location.
fn host_of(url: &str) -> &str {
    let Some(scheme_end) = url.find("://") else {
        return "";
    };
    let rest = &url[scheme_end + 3..];
    let end = rest
        .find(['/', '?', '#'])
        .unwrap_or(rest.len());
    &rest[..end]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(columns: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::new(
            "internal_all.csv",
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_missing_dataset_degrades_to_zero() {
        let store = DatasetStore::new();
        let outcome = evaluate(&store, "internal_all.csv", Calculation::MissingPageTitles);

        assert_eq!(outcome, MetricOutcome::MissingDataset);
        assert_eq!(outcome.reported_value(), Some(0));
    }

    #[test]
    fn test_missing_column_degrades_to_zero() {
        let ds = dataset(&["Address"], &[&["https://a.com/"]]);
        let outcome = Calculation::MissingPageTitles.evaluate(&ds);

        assert_eq!(outcome, MetricOutcome::MissingColumn(COL_TITLE));
        assert_eq!(outcome.reported_value(), Some(0));
    }

    #[test]
    fn test_missing_titles_counts_null_and_empty() {
        let ds = dataset(
            &["Address", "Title 1"],
            &[
                &["https://a.com/", "Home"],
                &["https://a.com/1", ""],
                &["https://a.com/2", ""],
            ],
        );

        assert_eq!(
            Calculation::MissingPageTitles.evaluate(&ds),
            MetricOutcome::Count(2)
        );
    }

    #[test]
    fn test_duplicates_count_all_occurrences_and_skip_empty() {
        let ds = dataset(
            &["Title 1"],
            &[&["Home"], &["Home"], &["Home"], &["About"], &[""], &[""]],
        );

        // Three rows share "Home"; the two empty rows never count
        assert_eq!(
            Calculation::DuplicatePageTitles.evaluate(&ds),
            MetricOutcome::Count(3)
        );
    }

    #[test]
    fn test_title_length_thresholds_are_exclusive() {
        let ds = dataset(
            &["Title 1 Length"],
            &[&["60"], &["61"], &["30"], &["29"], &["0"], &[""]],
        );

        assert_eq!(
            Calculation::LongPageTitles.evaluate(&ds),
            MetricOutcome::Count(1)
        );
        // 29 is short; 0 and blank are excluded, 30 is long enough
        assert_eq!(
            Calculation::ShortPageTitles.evaluate(&ds),
            MetricOutcome::Count(1)
        );
    }

    #[test]
    fn test_meta_description_length_thresholds() {
        let ds = dataset(
            &["Meta Description 1 Length"],
            &[&["161"], &["160"], &["119"], &["120"], &["0"]],
        );

        assert_eq!(
            Calculation::LongMetaDescriptions.evaluate(&ds),
            MetricOutcome::Count(1)
        );
        assert_eq!(
            Calculation::ShortMetaDescriptions.evaluate(&ds),
            MetricOutcome::Count(1)
        );
    }

    #[test]
    fn test_non_200_counts_blank_status() {
        let ds = dataset(
            &["Status Code"],
            &[&["200"], &["301"], &[""], &["broken"]],
        );

        assert_eq!(
            Calculation::Non200InSitemap.evaluate(&ds),
            MetricOutcome::Count(3)
        );
    }

    #[test]
    fn test_status_code_families() {
        let ds = dataset(
            &["Status Code"],
            &[
                &["200"],
                &["302"],
                &["307"],
                &["301"],
                &["404"],
                &["403"],
                &["500"],
                &["503"],
                &[""],
            ],
        );

        assert_eq!(
            Calculation::Client4xxErrors.evaluate(&ds),
            MetricOutcome::Count(2)
        );
        assert_eq!(
            Calculation::Server5xxErrors.evaluate(&ds),
            MetricOutcome::Count(2)
        );
        assert_eq!(
            Calculation::Status404Count.evaluate(&ds),
            MetricOutcome::Count(1)
        );
        assert_eq!(
            Calculation::TemporaryRedirects.evaluate(&ds),
            MetricOutcome::Count(2)
        );
    }

    #[test]
    fn test_noindex_match_is_case_insensitive() {
        let ds = dataset(
            &["Meta Robots 1"],
            &[
                &["NOINDEX, nofollow"],
                &["index, follow"],
                &["NoIndex"],
                &[""],
            ],
        );

        assert_eq!(
            Calculation::PagesWithNoindex.evaluate(&ds),
            MetricOutcome::Count(2)
        );
        assert_eq!(
            Calculation::PagesWithNofollow.evaluate(&ds),
            MetricOutcome::Count(1)
        );
    }

    #[test]
    fn test_robots_blocked_substring() {
        let ds = dataset(
            &["Indexability"],
            &[
                &["Non-Indexable - Blocked by robots.txt"],
                &["Indexable"],
                &[""],
            ],
        );

        assert_eq!(
            Calculation::RobotsTxtBlocked.evaluate(&ds),
            MetricOutcome::Count(1)
        );
        // Blank indexability reads as non-indexable
        assert_eq!(
            Calculation::NonIndexableInSitemap.evaluate(&ds),
            MetricOutcome::Count(2)
        );
    }

    #[test]
    fn test_missing_canonical_restricted_to_html() {
        let ds = dataset(
            &["Content Type", "Canonical Link Element 1"],
            &[
                &["text/html; charset=utf-8", ""],
                &["text/html", "https://a.com/"],
                &["image/png", ""],
            ],
        );

        assert_eq!(
            Calculation::MissingCanonical.evaluate(&ds),
            MetricOutcome::Count(1)
        );
    }

    #[test]
    fn test_missing_canonical_without_content_type_column() {
        let ds = dataset(
            &["Canonical Link Element 1"],
            &[&[""], &["https://a.com/"], &[""]],
        );

        assert_eq!(
            Calculation::MissingCanonical.evaluate(&ds),
            MetricOutcome::Count(2)
        );
    }

    #[test]
    fn test_canonicalised_pages() {
        let ds = dataset(
            &["Address", "Canonical Link Element 1"],
            &[
                &["https://a.com/x", "https://a.com/x"],
                &["https://a.com/y", "https://a.com/"],
                &["https://a.com/z", ""],
            ],
        );

        assert_eq!(
            Calculation::CanonicalisedPages.evaluate(&ds),
            MetricOutcome::Count(1)
        );
    }

    #[test]
    fn test_canonical_cross_domain() {
        let ds = dataset(
            &["Address", "Canonical Link Element 1"],
            &[
                &["https://a.com/x", "https://b.com/x"],
                &["https://a.com/y", "https://a.com/y"],
                &["https://a.com/z", "relative/path"],
                &["https://a.com/w", ""],
            ],
        );

        // Only the b.com canonical counts: same-domain matches, a canonical
        // without a network location, and a missing canonical all pass
        assert_eq!(
            Calculation::CanonicalDifferentDomain.evaluate(&ds),
            MetricOutcome::Count(1)
        );
    }

    #[test]
    fn test_multiple_h1_counts_present_second_heading() {
        let ds = dataset(
            &["H1-1", "H1-2"],
            &[&["Welcome", "Also welcome"], &["Welcome", ""]],
        );

        assert_eq!(
            Calculation::MultipleH1.evaluate(&ds),
            MetricOutcome::Count(1)
        );
    }

    #[test]
    fn test_image_size_threshold() {
        let ds = dataset(
            &["Size (Bytes)"],
            &[&["100000"], &["100001"], &["5000"], &[""]],
        );

        assert_eq!(
            Calculation::ImagesOver100kb.evaluate(&ds),
            MetricOutcome::Count(1)
        );
    }

    #[test]
    fn test_redirect_collections_use_row_count() {
        let ds = Dataset::new(
            "redirect_chains_all.csv",
            vec!["Address".to_string(), "Redirect URL".to_string()],
            vec![
                vec!["https://a.com/1".to_string(), "https://a.com/2".to_string()],
                vec!["https://a.com/2".to_string(), "https://a.com/3".to_string()],
            ],
        );

        assert_eq!(
            Calculation::RedirectChains.evaluate(&ds),
            MetricOutcome::Count(2)
        );
    }

    #[test]
    fn test_unimplemented_rules_are_flagged_not_zero() {
        let mut store = DatasetStore::new();
        store.insert(dataset(&["Address"], &[&["https://a.com/"]]));

        let outcome = evaluate(&store, "internal_all.csv", Calculation::UrlsNotInSitemap);
        assert_eq!(outcome, MetricOutcome::Unimplemented);
        assert_eq!(outcome.reported_value(), None);
    }

    #[test]
    fn test_host_extraction() {
        assert_eq!(host_of("https://www.a.com/page?q=1"), "www.a.com");
        assert_eq!(host_of("http://a.com"), "a.com");
        assert_eq!(host_of("relative/path"), "");
        assert_eq!(host_of(""), "");
    }
}
