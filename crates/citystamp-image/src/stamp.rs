//! Zone stamp overlay: diagonal gradient tint plus centered caption lines.

use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont, point};
use citystamp_core::Zone;
use image::RgbaImage;

const WHITE: [u8; 3] = [255, 255, 255];

const NAME_SCALE: f32 = 24.0;
const DESC_SCALE: f32 = 16.0;
/// Caption baselines, measured up from the bottom edge.
const NAME_BASELINE: f32 = 40.0;
const DESC_BASELINE: f32 = 15.0;
const NAME_ALPHA: f32 = 0.9;
const DESC_ALPHA: f32 = 0.7;

/// Two-color gradient endpoints for a zone overlay.
///
/// Resolved from the catalog's opaque style key; unknown keys fall back to
/// the default indigo pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampStyle {
    pub start: [u8; 3],
    pub start_alpha: f32,
    pub end: [u8; 3],
    pub end_alpha: f32,
}

impl StampStyle {
    /// Resolve a catalog style key to its gradient pair.
    pub fn for_key(key: &str) -> Self {
        match key {
            "central-park" => Self::pair([34, 197, 94], [22, 163, 74]),
            "golden-gate" => Self::pair([249, 115, 22], [234, 88, 12]),
            "times-square" => Self::pair([147, 51, 234], [126, 34, 206]),
            _ => Self::pair([99, 102, 241], [79, 70, 229]),
        }
    }

    fn pair(start: [u8; 3], end: [u8; 3]) -> Self {
        Self {
            start,
            start_alpha: 0.15,
            end,
            end_alpha: 0.10,
        }
    }
}

/// Composite the full zone stamp: gradient tint, then name and description
/// centered near the bottom of the canvas.
pub(crate) fn apply_stamp(canvas: &mut RgbaImage, zone: &Zone, font: &FontArc) {
    tint_gradient(canvas, StampStyle::for_key(&zone.filter_image));

    let (w, h) = canvas.dimensions();
    let center_x = w as f32 / 2.0;
    draw_centered_line(
        canvas,
        font,
        PxScale::from(NAME_SCALE),
        &zone.name,
        center_x,
        h as f32 - NAME_BASELINE,
        NAME_ALPHA,
    );
    draw_centered_line(
        canvas,
        font,
        PxScale::from(DESC_SCALE),
        &zone.description,
        center_x,
        h as f32 - DESC_BASELINE,
        DESC_ALPHA,
    );
}

/// Blend a linear gradient across the canvas along the top-left to
/// bottom-right diagonal. The gradient parameter is the projection of each
/// pixel onto that diagonal.
pub(crate) fn tint_gradient(canvas: &mut RgbaImage, style: StampStyle) {
    let (w, h) = canvas.dimensions();
    let (wf, hf) = (w as f32, h as f32);
    let denom = wf * wf + hf * hf;
    if denom == 0.0 {
        return;
    }
    for (x, y, px) in canvas.enumerate_pixels_mut() {
        let t = (x as f32 * wf + y as f32 * hf) / denom;
        let tint = [
            lerp(style.start[0], style.end[0], t),
            lerp(style.start[1], style.end[1], t),
            lerp(style.start[2], style.end[2], t),
        ];
        let alpha = style.start_alpha + (style.end_alpha - style.start_alpha) * t;
        blend(&mut px.0, tint, alpha);
    }
}

fn lerp(a: u8, b: u8, t: f32) -> f32 {
    a as f32 + (b as f32 - a as f32) * t
}

fn blend(px: &mut [u8; 4], tint: [f32; 3], alpha: f32) {
    for (channel, &target) in px.iter_mut().zip(tint.iter()) {
        let base = *channel as f32;
        *channel = (base + (target - base) * alpha).round().clamp(0.0, 255.0) as u8;
    }
}

/// Rasterize one line of text centered on `center_x` with its baseline at
/// `baseline_y`, coverage-blended white at the given opacity.
fn draw_centered_line(
    canvas: &mut RgbaImage,
    font: &FontArc,
    scale: PxScale,
    text: &str,
    center_x: f32,
    baseline_y: f32,
    alpha: f32,
) {
    if text.is_empty() {
        return;
    }
    let scaled = font.as_scaled(scale);
    let width = line_width(&scaled, text);
    let (cw, ch) = canvas.dimensions();

    let mut caret = center_x - width / 2.0;
    let mut prev: Option<GlyphId> = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, point(caret, baseline_y));
        caret += scaled.h_advance(id);
        prev = Some(id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i32 + gx as i32;
            let y = bounds.min.y as i32 + gy as i32;
            if x < 0 || y < 0 || x as u32 >= cw || y as u32 >= ch {
                return;
            }
            let px = canvas.get_pixel_mut(x as u32, y as u32);
            let weight = (coverage.clamp(0.0, 1.0) * alpha).min(1.0);
            blend(
                &mut px.0,
                [WHITE[0] as f32, WHITE[1] as f32, WHITE[2] as f32],
                weight,
            );
        });
    }
}

fn line_width<S: ScaleFont<F>, F: Font>(scaled: &S, text: &str) -> f32 {
    let mut width = 0.0;
    let mut prev: Option<GlyphId> = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }
    width
}
