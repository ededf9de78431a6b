//! Rendering helpers shared by views.

use jikan_client::api::Anime;
use std::fmt::Write;

/// Entry in a numbered pagination strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

/// Page numbers to show around `current`.
///
/// Up to seven pages are listed in full. Beyond that the strip keeps the
/// first and last page and a window around the current one, with ellipses
/// for the gaps.
pub fn page_window(current: u32, last: u32) -> Vec<PageItem> {
    use PageItem::{Ellipsis, Page};

    if last <= 7 {
        return (1..=last).map(Page).collect();
    }

    if current <= 3 {
        let mut items: Vec<_> = (1..=4).map(Page).collect();
        items.extend([Ellipsis, Page(last)]);
        items
    } else if current >= last - 2 {
        let mut items = vec![Page(1), Ellipsis];
        items.extend((last - 3..=last).map(Page));
        items
    } else {
        let mut items = vec![Page(1), Ellipsis];
        items.extend((current - 1..=current + 1).map(Page));
        items.extend([Ellipsis, Page(last)]);
        items
    }
}

/// Render the strip as text, bracketing the current page
pub fn render_page_strip(current: u32, last: u32) -> String {
    page_window(current, last)
        .into_iter()
        .map(|item| match item {
            PageItem::Page(p) if p == current => format!("[{p}]"),
            PageItem::Page(p) => p.to_string(),
            PageItem::Ellipsis => "...".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-line summary used by list views
pub fn summary_line(anime: &Anime) -> String {
    let mut line = format!("{:>6}  {}", anime.mal_id, anime.display_title());

    let mut meta = Vec::new();
    if let Some(year) = anime.year {
        meta.push(year.to_string());
    }
    if let Some(kind) = &anime.anime_type {
        meta.push(kind.clone());
    }
    if let Some(episodes) = anime.episodes {
        meta.push(format!("{episodes} ep"));
    }
    if let Some(score) = anime.score {
        meta.push(format!("★ {score:.2}"));
    }

    if !meta.is_empty() {
        let _ = write!(line, "  ({})", meta.join(" · "));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::PageItem::{Ellipsis, Page};
    use super::*;

    #[test]
    fn test_short_strip_lists_every_page() {
        assert_eq!(page_window(1, 1), vec![Page(1)]);
        assert_eq!(page_window(4, 7).len(), 7);
        assert!(page_window(1, 0).is_empty());
    }

    #[test]
    fn test_long_strip_windows() {
        assert_eq!(
            page_window(2, 20),
            vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(20)]
        );
        assert_eq!(
            page_window(19, 20),
            vec![Page(1), Ellipsis, Page(17), Page(18), Page(19), Page(20)]
        );
        assert_eq!(
            page_window(10, 20),
            vec![
                Page(1),
                Ellipsis,
                Page(9),
                Page(10),
                Page(11),
                Ellipsis,
                Page(20)
            ]
        );
    }

    #[test]
    fn test_render_strip() {
        assert_eq!(render_page_strip(2, 3), "1 [2] 3");
        assert_eq!(render_page_strip(1, 9), "[1] 2 3 4 ... 9");
    }

    #[test]
    fn test_summary_line() {
        let anime: Anime = serde_json::from_value(serde_json::json!({
            "mal_id": 1,
            "title": "Cowboy Bebop",
            "type": "TV",
            "episodes": 26,
            "score": 8.75,
            "year": 1998
        }))
        .unwrap();
        assert_eq!(
            summary_line(&anime),
            "     1  Cowboy Bebop  (1998 · TV · 26 ep · ★ 8.75)"
        );
    }
}
