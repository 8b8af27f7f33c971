//! Extraction of cinema blocks and schedule rows from a listing page.
//!
//! The listing page shape this module reads:
//!
//! ```html
//! <div class="box cinema">
//!   <div><h2>Kino Aero</h2></div>
//!   <div>
//!     <table>
//!       <tr>
//!         <th><a href="/film/123-vlny/">Vlny</a> <span>(2024)</span></th>
//!         <td class="flags"><span>T</span></td>
//!         <td>18:30</td>
//!         <td>21:00</td>
//!       </tr>
//!     </table>
//!   </div>
//! </div>
//! ```
//!
//! Each piece is read by its own function returning [`Error::Structure`] when a
//! required node is absent, so the caller's [`MalformedPolicy`] decides whether the
//! whole extraction fails or the entry is dropped.

use crate::config::MalformedPolicy;
use crate::fetcher::{PageSource, parse_document};
use crate::rating::RatingResolver;
use crate::{Cinema, CinemaBlock, Error, MovieRow, Result};
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Any element whose class attribute contains `cinema`.
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static CINEMA_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[class*="cinema"]"#).unwrap());

/// Locate every cinema block and read its heading and rows.
///
/// A document without cinema blocks yields an empty vector.
pub fn extract_cinemas(
    document: &Html,
    base: &Url,
    policy: MalformedPolicy,
) -> Result<Vec<CinemaBlock>> {
    let mut cinemas = Vec::new();

    for (index, block) in document.select(&CINEMA_BLOCK).enumerate() {
        let name = match cinema_name(block) {
            Ok(name) => name,
            Err(err) => {
                let err = with_context(err, format!("cinema block {index}"));
                skip_or_fail(policy, err)?;
                continue;
            },
        };

        let mut rows = Vec::new();
        for (row_index, row) in schedule_rows(block).into_iter().enumerate() {
            match movie_row(row, base) {
                Ok(movie) => rows.push(movie),
                Err(err) => {
                    let err = with_context(err, format!("{name}, row {row_index}"));
                    skip_or_fail(policy, err)?;
                },
            }
        }

        debug!(cinema = %name, rows = rows.len(), "extracted cinema block");
        cinemas.push(CinemaBlock { name, rows });
    }

    Ok(cinemas)
}

fn skip_or_fail(policy: MalformedPolicy, err: Error) -> Result<()> {
    match policy {
        MalformedPolicy::Fail => Err(err),
        MalformedPolicy::Skip => {
            warn!("skipping malformed listing entry: {err}");
            Ok(())
        },
    }
}

fn with_context(err: Error, context: String) -> Error {
    match err {
        Error::Structure { element, .. } => Error::Structure { element, context },
        other => other,
    }
}

/// Heading text at `div > h2`.
pub fn cinema_name(block: ElementRef<'_>) -> Result<String> {
    children_named(block, "div")
        .find_map(|div| children_named(div, "h2").next())
        .map(text_of)
        .ok_or_else(|| Error::missing("cinema heading", ""))
}

/// Schedule rows at `div > table > tr`.
///
/// The HTML parser wraps bare rows in an implied `tbody`, so rows inside a
/// `thead`/`tbody`/`tfoot` section count as well.
pub fn schedule_rows(block: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for table in children_named(block, "div").flat_map(|div| children_named(div, "table")) {
        for child in child_elements(table) {
            match child.value().name() {
                "tr" => rows.push(child),
                "thead" | "tbody" | "tfoot" => rows.extend(children_named(child, "tr")),
                _ => {},
            }
        }
    }
    rows
}

/// Read one schedule row into a [`MovieRow`].
pub fn movie_row(row: ElementRef<'_>, base: &Url) -> Result<MovieRow> {
    let (title, url) = title_link(row, base)?;
    let year = release_year(row)?;

    Ok(MovieRow {
        name: format!("{title} {year}"),
        times: showtimes(row),
        url,
        flags: flags(row),
    })
}

/// Title text and absolute detail URL from `th > a`.
pub fn title_link(row: ElementRef<'_>, base: &Url) -> Result<(String, String)> {
    let link = children_named(row, "th")
        .find_map(|th| children_named(th, "a").next())
        .ok_or_else(|| Error::missing("title link", ""))?;

    let href = link.value().attr("href").unwrap_or_default().trim();
    let url = base
        .join(href)
        .map_err(|e| Error::InvalidUrl(format!("title link '{href}': {e}")))?;

    Ok((text_of(link), url.into()))
}

/// Release year text from `th > span`.
pub fn release_year(row: ElementRef<'_>) -> Result<String> {
    children_named(row, "th")
        .find_map(|th| children_named(th, "span").next())
        .map(text_of)
        .ok_or_else(|| Error::missing("release year", ""))
}

/// Text of every `td` without a class attribute, empty cells dropped.
pub fn showtimes(row: ElementRef<'_>) -> Vec<String> {
    children_named(row, "td")
        .filter(|td| td.value().attr("class").is_none())
        .map(text_of)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Text of every `span` inside the `flags` cell, empty spans dropped.
///
/// A row without a flags cell has no flags.
pub fn flags(row: ElementRef<'_>) -> Vec<String> {
    children_named(row, "td")
        .filter(|td| td.value().classes().any(|class| class == "flags"))
        .flat_map(|td| children_named(td, "span"))
        .map(text_of)
        .filter(|text| !text.is_empty())
        .collect()
}

fn child_elements(element: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    element.children().filter_map(ElementRef::wrap)
}

fn children_named<'a>(
    element: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    child_elements(element).filter(move |child| child.value().name() == name)
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Fetches a listing page and turns it into rated cinemas.
pub struct ListingExtractor {
    source: Arc<dyn PageSource>,
    resolver: Arc<RatingResolver>,
    base: Url,
    policy: MalformedPolicy,
}

impl ListingExtractor {
    /// Build an extractor resolving relative title links against `base_url`.
    pub fn new(
        source: Arc<dyn PageSource>,
        resolver: Arc<RatingResolver>,
        base_url: &str,
        policy: MalformedPolicy,
    ) -> Result<Self> {
        let base = Url::parse(base_url)?;
        Ok(Self {
            source,
            resolver,
            base,
            policy,
        })
    }

    /// Fetch `listing_url`, extract its cinema blocks and resolve every rating.
    ///
    /// Cinemas and titles keep document order whatever order the ratings
    /// complete in.
    #[instrument(skip(self))]
    pub async fn extract(&self, listing_url: &str) -> Result<Vec<Cinema>> {
        let body = self.source.fetch_text(listing_url).await?;
        let blocks = {
            let document = parse_document(&body);
            extract_cinemas(&document, &self.base, self.policy)?
        };

        let urls: Vec<String> = blocks
            .iter()
            .flat_map(|block| block.rows.iter().map(|row| row.url.clone()))
            .collect();
        let title_count = urls.len();
        let ratings = self.resolver.resolve_all(urls).await?;
        debug_assert_eq!(ratings.len(), title_count);

        // Ratings are index-aligned with the flattened rows
        let mut ratings = ratings.into_iter();
        let cinemas: Vec<Cinema> = blocks
            .into_iter()
            .map(|block| Cinema {
                name: block.name,
                movies: block
                    .rows
                    .into_iter()
                    .zip(ratings.by_ref())
                    .map(|(row, rating)| row.with_rating(rating))
                    .collect(),
            })
            .collect();

        info!(
            "Extracted {} cinemas with {} titles from {}",
            cinemas.len(),
            title_count,
            listing_url
        );
        Ok(cinemas)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{Rating, RatingMemo};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::time::Duration;

    fn base() -> Url {
        Url::parse("http://csfd.cz").unwrap()
    }

    fn row_html(cells: &str) -> String {
        format!(
            r#"<div class="cinema"><div><h2>Aero</h2></div><div><table><tr>
                <th><a href="/film/1-vlny/">Vlny</a> <span>(2024)</span></th>{cells}
            </tr></table></div></div>"#
        )
    }

    fn extract(html: &str) -> Result<Vec<CinemaBlock>> {
        extract_cinemas(&Html::parse_document(html), &base(), MalformedPolicy::Fail)
    }

    #[test]
    fn test_no_cinema_blocks_yields_empty() {
        let blocks = extract("<html><body><p>Dnes se nehraje</p></body></html>").unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_full_row() {
        let html = row_html(r#"<td class="flags"><span>T</span><span>3D</span></td><td>18:30</td>"#);
        let blocks = extract(&html).unwrap();

        assert_eq!(
            blocks,
            vec![CinemaBlock {
                name: "Aero".to_string(),
                rows: vec![MovieRow {
                    name: "Vlny (2024)".to_string(),
                    times: vec!["18:30".to_string()],
                    url: "http://csfd.cz/film/1-vlny/".to_string(),
                    flags: vec!["T".to_string(), "3D".to_string()],
                }],
            }]
        );
    }

    #[test]
    fn test_empty_time_cells_are_dropped() {
        let html = row_html("<td></td><td>18:30</td><td>21:00</td>");
        let blocks = extract(&html).unwrap();
        assert_eq!(blocks[0].rows[0].times, vec!["18:30", "21:00"]);
    }

    #[test]
    fn test_time_cells_with_class_are_ignored() {
        let html = row_html(r#"<td class="date">Po 14.10.</td><td>18:30</td>"#);
        let blocks = extract(&html).unwrap();
        assert_eq!(blocks[0].rows[0].times, vec!["18:30"]);
    }

    #[test]
    fn test_row_without_time_cells_has_no_times() {
        let blocks = extract(&row_html("")).unwrap();
        assert!(blocks[0].rows[0].times.is_empty());
    }

    #[test]
    fn test_flags_drop_empty_spans() {
        let html = row_html(r#"<td class="flags"><span></span><span>OV</span><span></span></td>"#);
        let blocks = extract(&html).unwrap();
        assert_eq!(blocks[0].rows[0].flags, vec!["OV"]);
    }

    #[test]
    fn test_missing_flags_cell_means_no_flags() {
        let blocks = extract(&row_html("<td>18:30</td>")).unwrap();
        assert!(blocks[0].rows[0].flags.is_empty());
    }

    #[test]
    fn test_rows_and_cinemas_keep_document_order() {
        let html = r#"
            <div class="cinema"><div><h2>Aero</h2></div><div><table>
                <tr><th><a href="/film/1/">A</a><span>(2001)</span></th><td>10:00</td></tr>
                <tr><th><a href="/film/2/">B</a><span>(2002)</span></th><td>11:00</td></tr>
            </table></div></div>
            <div class="cinema"><div><h2>Bio Oko</h2></div><div><table>
                <tr><th><a href="/film/3/">C</a><span>(2003)</span></th><td>12:00</td></tr>
            </table></div></div>"#;

        let blocks = extract(html).unwrap();
        let names: Vec<_> = blocks.iter().map(|b| b.name.as_str()).collect();
        let titles: Vec<_> = blocks
            .iter()
            .flat_map(|b| b.rows.iter().map(|r| r.name.as_str()))
            .collect();

        assert_eq!(names, vec!["Aero", "Bio Oko"]);
        assert_eq!(titles, vec!["A (2001)", "B (2002)", "C (2003)"]);
    }

    #[test]
    fn test_explicit_tbody_rows_are_found() {
        let html = r#"<div class="cinema"><div><h2>Aero</h2></div><div><table><tbody>
            <tr><th><a href="/film/1/">A</a><span>(2001)</span></th></tr>
        </tbody></table></div></div>"#;
        assert_eq!(extract(html).unwrap()[0].rows.len(), 1);
    }

    #[test]
    fn test_absolute_href_is_kept() {
        let html = r#"<div class="cinema"><div><h2>Aero</h2></div><div><table>
            <tr><th><a href="https://www.csfd.cz/film/9/">A</a><span>(2001)</span></th></tr>
        </table></div></div>"#;
        assert_eq!(extract(html).unwrap()[0].rows[0].url, "https://www.csfd.cz/film/9/");
    }

    #[test]
    fn test_missing_heading_fails_by_default() {
        let html = r#"<div class="cinema"><div><p>no heading</p></div></div>"#;
        match extract(html) {
            Err(Error::Structure { element, context }) => {
                assert_eq!(element, "cinema heading");
                assert_eq!(context, "cinema block 0");
            },
            other => panic!("expected structure error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_title_link_fails_by_default() {
        let html = r#"<div class="cinema"><div><h2>Aero</h2></div><div><table>
            <tr><th><span>(2001)</span></th><td>10:00</td></tr>
        </table></div></div>"#;
        match extract(html) {
            Err(Error::Structure { element, context }) => {
                assert_eq!(element, "title link");
                assert_eq!(context, "Aero, row 0");
            },
            other => panic!("expected structure error, got {other:?}"),
        }
    }

    #[test]
    fn test_skip_policy_drops_only_malformed_entries() {
        let html = r#"
            <div class="cinema"><div><p>broken</p></div></div>
            <div class="cinema"><div><h2>Aero</h2></div><div><table>
                <tr><th><span>(2001)</span></th></tr>
                <tr><th><a href="/film/2/">B</a><span>(2002)</span></th></tr>
            </table></div></div>"#;

        let blocks =
            extract_cinemas(&Html::parse_document(html), &base(), MalformedPolicy::Skip).unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "Aero");
        assert_eq!(blocks[0].rows.len(), 1);
        assert_eq!(blocks[0].rows[0].name, "B (2002)");
    }

    /// Listing plus detail pages whose fetch time shrinks with document order.
    struct Site {
        pages: HashMap<String, (String, Duration)>,
    }

    #[async_trait]
    impl PageSource for Site {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            let (body, delay) = self
                .pages
                .get(url)
                .cloned()
                .ok_or_else(|| Error::NotFound(url.to_string()))?;
            tokio::time::sleep(delay).await;
            Ok(body)
        }
    }

    #[tokio::test]
    async fn test_extract_pairs_each_row_with_its_own_rating() {
        let listing = r#"
            <div class="cinema"><div><h2>Aero</h2></div><div><table>
                <tr><th><a href="/film/1/">A</a><span>(2001)</span></th></tr>
                <tr><th><a href="/film/2/">B</a><span>(2002)</span></th></tr>
            </table></div></div>
            <div class="cinema"><div><h2>Bio Oko</h2></div><div><table></table></div></div>
            <div class="cinema"><div><h2>Lucerna</h2></div><div><table>
                <tr><th><a href="/film/3/">C</a><span>(2003)</span></th></tr>
            </table></div></div>"#;
        let detail = |percent: &str, millis: u64| {
            (
                format!(r#"<h2 class="average">{percent}</h2>"#),
                Duration::from_millis(millis),
            )
        };
        let pages = HashMap::from([
            ("http://list/".to_string(), (listing.to_string(), Duration::ZERO)),
            ("http://csfd.cz/film/1/".to_string(), detail("10%", 60)),
            ("http://csfd.cz/film/2/".to_string(), detail("N/A", 30)),
            ("http://csfd.cz/film/3/".to_string(), detail("30%", 0)),
        ]);
        let source: Arc<dyn PageSource> = Arc::new(Site { pages });
        let resolver = Arc::new(RatingResolver::new(
            Arc::clone(&source),
            RatingMemo::in_memory(None),
            3,
        ));
        let extractor =
            ListingExtractor::new(source, resolver, "http://csfd.cz", MalformedPolicy::Fail)
                .unwrap();

        let cinemas = extractor.extract("http://list/").await.unwrap();

        let rated: Vec<_> = cinemas
            .iter()
            .map(|c| {
                let movies: Vec<_> = c.movies.iter().map(|m| (m.name.as_str(), m.rating)).collect();
                (c.name.as_str(), movies)
            })
            .collect();
        assert_eq!(
            rated,
            vec![
                (
                    "Aero",
                    vec![
                        ("A (2001)", Rating::new(10).unwrap()),
                        ("B (2002)", Rating::UNKNOWN),
                    ]
                ),
                ("Bio Oko", vec![]),
                ("Lucerna", vec![("C (2003)", Rating::new(30).unwrap())]),
            ]
        );
    }
}
