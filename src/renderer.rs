// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 标注渲染: 把 DrawInstruction 画到原图上

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::analysis::DrawInstruction;

pub const LINE_THICKNESS: i32 = 2;
pub const LABEL_SCALE: f32 = 16.0;

pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontVec> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|e| anyhow::anyhow!("Invalid font {}: {}", path.display(), e))
}

/// Clamps a box to the canvas. `None` when nothing of it is visible.
fn clamp_rect(inst: &DrawInstruction, width: u32, height: u32) -> Option<Rect> {
    let x1 = inst.x1.max(0.0).round() as i32;
    let y1 = inst.y1.max(0.0).round() as i32;
    let x2 = (inst.x2.round() as i32).min(width as i32 - 1);
    let y2 = (inst.y2.round() as i32).min(height as i32 - 1);
    if x2 < x1 || y2 < y1 {
        return None;
    }
    Some(Rect::at(x1, y1).of_size((x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32))
}

/// Paints every instruction: a hollow box and, when a font is given, a
/// filled label tab above it.
pub fn render_annotations(
    canvas: &mut RgbImage,
    instructions: &[DrawInstruction],
    font: Option<&FontVec>,
) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    for inst in instructions {
        let Some(rect) = clamp_rect(inst, width, height) else {
            continue;
        };
        let (r, g, b) = inst.color;
        let color = Rgb([r, g, b]);

        for t in 0..LINE_THICKNESS {
            let w = rect.width() as i32 - 2 * t;
            let h = rect.height() as i32 - 2 * t;
            if w <= 0 || h <= 0 {
                break;
            }
            let inner = Rect::at(rect.left() + t, rect.top() + t).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, inner, color);
        }

        if let Some(font) = font {
            let scale = PxScale::from(LABEL_SCALE);
            let (text_w, text_h) = text_size(scale, font, &inst.label);
            let tab_h = text_h as i32 + 4;
            let tab_y = if rect.top() >= tab_h {
                rect.top() - tab_h
            } else {
                rect.top()
            };
            let tab = Rect::at(rect.left(), tab_y).of_size(text_w + 4, tab_h as u32);
            draw_filled_rect_mut(canvas, tab, color);
            draw_text_mut(
                canvas,
                Rgb([0, 0, 0]),
                rect.left() + 2,
                tab_y + 2,
                scale,
                font,
                &inst.label,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(x1: f32, y1: f32, x2: f32, y2: f32) -> DrawInstruction {
        DrawInstruction {
            x1,
            y1,
            x2,
            y2,
            label: "Single FU".to_string(),
            color: (255, 255, 0),
        }
    }

    #[test]
    fn test_draws_box_outline() {
        let mut canvas = RgbImage::new(50, 50);
        render_annotations(&mut canvas, &[instruction(10., 10., 30., 30.)], None);
        assert_eq!(canvas.get_pixel(10, 20), &Rgb([255, 255, 0]));
        assert_eq!(canvas.get_pixel(11, 20), &Rgb([255, 255, 0]));
        assert_eq!(canvas.get_pixel(20, 20), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_offscreen_boxes_are_skipped_or_clamped() {
        let mut canvas = RgbImage::new(20, 20);
        render_annotations(
            &mut canvas,
            &[instruction(100., 100., 120., 120.), instruction(-5., -5., 40., 10.)],
            None,
        );
        assert_eq!(canvas.get_pixel(0, 5), &Rgb([255, 255, 0]));
        assert_eq!(canvas.get_pixel(19, 5), &Rgb([255, 255, 0]));
    }
}
