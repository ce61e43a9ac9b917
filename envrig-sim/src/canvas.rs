use image::{Rgb, RgbImage};
use itertools::iproduct;

pub(crate) const BACKGROUND: Rgb<u8> = Rgb([245, 245, 245]);
pub(crate) const BORDER: Rgb<u8> = Rgb([60, 60, 60]);
pub(crate) const GOAL: Rgb<u8> = Rgb([46, 160, 67]);
pub(crate) const AGENT: Rgb<u8> = Rgb([31, 111, 235]);

// one hue per agent, cycled when there are more agents than entries
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 111, 235]),
    Rgb([218, 54, 51]),
    Rgb([191, 135, 0]),
    Rgb([137, 87, 229]),
    Rgb([26, 127, 127]),
    Rgb([219, 97, 162]),
];

pub(crate) fn agent_color(idx: usize) -> Rgb<u8> {
    PALETTE[idx % PALETTE.len()]
}

/// Lighter version of `color`, used for goal markers.
pub(crate) fn tint(color: Rgb<u8>) -> Rgb<u8> {
    Rgb(color.0.map(|c| c / 2 + 128))
}

pub(crate) fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for (px, py) in iproduct!(x..x_end, y..y_end) {
        img.put_pixel(px, py, color);
    }
}

/// Outlines every cell of a `cols x rows` grid of `cell` pixel squares.
pub(crate) fn grid_lines(img: &mut RgbImage, cols: u32, rows: u32, cell: u32, color: Rgb<u8>) {
    for col in 0..=cols {
        let x = (col * cell).min(img.width() - 1);
        fill_rect(img, x, 0, 1, img.height(), color);
    }
    for row in 0..=rows {
        let y = (row * cell).min(img.height() - 1);
        fill_rect(img, 0, y, img.width(), 1, color);
    }
}

pub(crate) fn fill_circle(img: &mut RgbImage, cx: f32, cy: f32, radius: f32, color: Rgb<u8>) {
    let x0 = (cx - radius).floor().max(0.) as u32;
    let y0 = (cy - radius).floor().max(0.) as u32;
    let x1 = ((cx + radius).ceil().max(0.) as u32).min(img.width());
    let y1 = ((cy + radius).ceil().max(0.) as u32).min(img.height());
    for (px, py) in iproduct!(x0..x1, y0..y1) {
        let dx = px as f32 + 0.5 - cx;
        let dy = py as f32 + 0.5 - cy;
        if dx * dx + dy * dy <= radius * radius {
            img.put_pixel(px, py, color);
        }
    }
}
