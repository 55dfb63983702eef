//! Page tiling: slicing one tall rendered surface into document pages.
//!
//! The dashboard is captured as a single raster much taller than an output
//! page. Rather than cropping the raster (lossy, allocation-heavy), each
//! output page draws the *full* image shifted upward by a per-page offset
//! and lets the page's media box clip it:
//!
//! ```text
//! source, scaled to page width          page 0        page 1        page 2
//! 0    ┌────────────┐               y = 0 ┌─────┐     ┌─────┐       ┌─────┐
//!      │  band 0    │                     │band0│     │band1│       │band2│
//! h    ├────────────┤               offset 0      offset -h    offset -2h
//!      │  band 1    │
//! 2h   ├────────────┤              (h = page height; the image is drawn at
//!      │  band 2    │               the offset and clipped to one page)
//!      └────────────┘
//! ```
//!
//! [`paginate`] computes those offsets with signed remaining-height
//! accounting and is pure arithmetic: no rasterisation, no I/O. Drawing the
//! tiles is the document writer's job.

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Hard ceiling on tiles per export. Geometry that derives more pages than
/// this is treated as invalid rather than silently building a huge document.
pub const MAX_PAGE_COUNT: usize = 10_000;

/// Output page geometry in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageFormat {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageFormat {
    /// ISO A4 portrait.
    pub const A4: PageFormat = PageFormat {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    /// US Letter portrait.
    pub const LETTER: PageFormat = PageFormat {
        width_mm: 215.9,
        height_mm: 279.4,
    };

    /// Parse `"a4"`, `"letter"` or a custom `"<width>x<height>"` in
    /// millimetres (e.g. `"210x297"`).
    pub fn parse(s: &str) -> Result<Self, ReportError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(Self::A4),
            "letter" => Ok(Self::LETTER),
            custom => {
                let parse_err = || {
                    ReportError::InvalidConfig(format!(
                        "unknown page format '{s}' (expected 'a4', 'letter' or '<width>x<height>' in mm)"
                    ))
                };
                let (w, h) = custom.split_once('x').ok_or_else(parse_err)?;
                let width_mm: f64 = w.trim().parse().map_err(|_| parse_err())?;
                let height_mm: f64 = h.trim().parse().map_err(|_| parse_err())?;
                if !(width_mm > 0.0 && width_mm.is_finite() && height_mm > 0.0 && height_mm.is_finite())
                {
                    return Err(ReportError::InvalidConfig(format!(
                        "page format '{s}' has non-positive dimensions"
                    )));
                }
                Ok(PageFormat {
                    width_mm,
                    height_mm,
                })
            }
        }
    }
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::A4
    }
}

/// Placement of one output page on the scaled source image.
///
/// `source_y_offset` is where the top of the full source image sits relative
/// to this page's top edge: `0` on the first page, increasingly negative on
/// later pages so that the next unseen band lines up with the page top.
/// Computed fresh per export, consumed immediately by the document writer,
/// then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageTile {
    pub page_index: usize,
    pub source_y_offset: f64,
    pub is_first_page: bool,
}

/// Height of the source after uniform scaling to the page width.
///
/// The source is scaled so its width exactly equals `page_width`; the same
/// factor applies to its height. Callers validate dimensions; this is the
/// bare ratio.
pub fn scaled_height(source_height_px: f64, source_width_px: f64, page_width: f64) -> f64 {
    source_height_px * (page_width / source_width_px)
}

/// Compute the ordered page tiles needed to show the whole scaled source.
///
/// All four dimensions must be positive and finite; anything else fails with
/// [`ReportError::InvalidDimension`] before any tile is produced. On success
/// the result holds exactly `ceil(scaled_height / page_height)` tiles with
/// contiguous indices from 0. The first tile is always
/// `{ page_index: 0, source_y_offset: 0.0, is_first_page: true }`; each
/// later tile's offset is `remaining - scaled_height` at the moment it is
/// emitted, which places band `k` (top `k * page_height`) at the top of page
/// `k`. Drawn at those offsets and clipped to the page, the visible bands
/// partition `[0, scaled_height)` with no gap and no duplication.
pub fn paginate(
    source_height_px: f64,
    source_width_px: f64,
    page_width: f64,
    page_height: f64,
) -> Result<Vec<PageTile>, ReportError> {
    check_dimension("source height", source_height_px)?;
    check_dimension("source width", source_width_px)?;
    check_dimension("page width", page_width)?;
    check_dimension("page height", page_height)?;

    let scaled = scaled_height(source_height_px, source_width_px, page_width);
    let expected = (scaled / page_height).ceil();
    if expected > MAX_PAGE_COUNT as f64 {
        return Err(ReportError::ExcessivePageCount {
            pages: expected as usize,
            limit: MAX_PAGE_COUNT,
        });
    }

    let mut tiles = vec![PageTile {
        page_index: 0,
        source_y_offset: 0.0,
        is_first_page: true,
    }];
    let mut remaining = scaled - page_height;
    let mut page_index = 0usize;
    while remaining > 0.0 {
        page_index += 1;
        tiles.push(PageTile {
            page_index,
            source_y_offset: remaining - scaled,
            is_first_page: false,
        });
        remaining -= page_height;
    }

    tracing::debug!(
        source_height_px,
        source_width_px,
        scaled_height = scaled,
        pages = tiles.len(),
        "computed page tiling"
    );
    Ok(tiles)
}

fn check_dimension(name: &'static str, value: f64) -> Result<(), ReportError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ReportError::InvalidDimension { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Source width equal to page width keeps scaled height == source height,
    // so the tiling numbers can be read straight off the inputs.
    fn tile_flat(source_height: f64, page_height: f64) -> Vec<PageTile> {
        paginate(source_height, 210.0, 210.0, page_height).unwrap()
    }

    #[test]
    fn first_tile_is_page_zero_at_origin() {
        let tiles = tile_flat(1000.0, 400.0);
        assert_eq!(
            tiles[0],
            PageTile {
                page_index: 0,
                source_y_offset: 0.0,
                is_first_page: true
            }
        );
        assert!(tiles[1..].iter().all(|t| !t.is_first_page));
    }

    #[test]
    fn single_tile_when_surface_fits_one_page() {
        assert_eq!(tile_flat(400.0, 400.0).len(), 1);
        assert_eq!(tile_flat(1.0, 400.0).len(), 1);
        // Scaling matters, not raw pixel height: 2000px wide source on a
        // 210mm page shrinks far below one page height.
        let tiles = paginate(800.0, 2000.0, 210.0, 297.0).unwrap();
        assert_eq!(tiles.len(), 1);
    }

    #[test]
    fn three_page_offsets_follow_remaining_minus_scaled_height() {
        // scaled height 1000, page height 400: remaining walks 600 → 200,
        // each emitted offset is remaining - 1000.
        let tiles = tile_flat(1000.0, 400.0);
        let offsets: Vec<f64> = tiles.iter().map(|t| t.source_y_offset).collect();
        assert_eq!(offsets, vec![0.0, -400.0, -800.0]);
    }

    #[test]
    fn offsets_place_each_band_at_its_page_top() {
        let page_height = 297.0;
        let scaled = 1000.0;
        let tiles = tile_flat(scaled, page_height);
        for (k, tile) in tiles.iter().enumerate() {
            // Band k starts at k * page_height in source space; drawing the
            // image at the offset puts that band at the page top.
            let band_top = k as f64 * page_height;
            assert!((tile.source_y_offset + band_top).abs() < 1e-9);
        }
        // The last band reaches the bottom of the source.
        let covered = tiles.len() as f64 * page_height;
        assert!(covered >= scaled);
        assert!(covered - page_height < scaled);
    }

    #[test]
    fn tile_count_matches_ceiling() {
        for (scaled, page_height) in [
            (1000.0_f64, 400.0),
            (1200.0, 400.0),
            (400.0, 400.0),
            (401.0, 400.0),
            (297.0, 297.0),
            (298.0, 297.0),
            (5000.0, 297.0),
            (0.5, 297.0),
        ] {
            let expected = (scaled / page_height).ceil() as usize;
            let tiles = tile_flat(scaled, page_height);
            assert_eq!(
                tiles.len(),
                expected,
                "scaled={scaled} page_height={page_height}"
            );
        }
    }

    #[test]
    fn indices_are_contiguous_from_zero() {
        let tiles = tile_flat(5000.0, 297.0);
        for (k, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.page_index, k);
        }
    }

    #[test]
    fn exact_multiple_has_no_trailing_blank_page() {
        // remaining hits exactly 0.0; the loop must not emit a fourth tile.
        assert_eq!(tile_flat(1200.0, 400.0).len(), 3);
    }

    #[test]
    fn invalid_dimension_for_each_nonpositive_input() {
        let good = [1000.0, 800.0, 210.0, 297.0];
        for slot in 0..4 {
            for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
                let mut dims = good;
                dims[slot] = bad;
                let err = paginate(dims[0], dims[1], dims[2], dims[3]).unwrap_err();
                assert!(
                    matches!(err, ReportError::InvalidDimension { .. }),
                    "slot {slot} value {bad} gave {err:?}"
                );
            }
        }
    }

    #[test]
    fn absurd_page_count_is_rejected() {
        let err = paginate(10_000_000.0, 210.0, 210.0, 1.0).unwrap_err();
        assert!(matches!(err, ReportError::ExcessivePageCount { .. }));
    }

    #[test]
    fn scaled_height_follows_width_ratio() {
        assert_eq!(scaled_height(1000.0, 500.0, 210.0), 420.0);
        assert_eq!(scaled_height(1240.0, 1240.0, 210.0), 210.0);
    }

    #[test]
    fn page_format_parse_known_names() {
        assert_eq!(PageFormat::parse("a4").unwrap(), PageFormat::A4);
        assert_eq!(PageFormat::parse("A4").unwrap(), PageFormat::A4);
        assert_eq!(PageFormat::parse(" letter ").unwrap(), PageFormat::LETTER);
    }

    #[test]
    fn page_format_parse_custom_dimensions() {
        let f = PageFormat::parse("105x148").unwrap();
        assert_eq!(f.width_mm, 105.0);
        assert_eq!(f.height_mm, 148.0);
    }

    #[test]
    fn page_format_parse_rejects_garbage() {
        for s in ["a5", "tabloid", "210", "x297", "210x", "0x297", "-10x20"] {
            assert!(
                matches!(PageFormat::parse(s), Err(ReportError::InvalidConfig(_))),
                "accepted '{s}'"
            );
        }
    }
}
