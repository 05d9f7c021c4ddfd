use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocDiag {
    pub tools: Vec<ToolDiag>,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDiag {
    pub name: String,
    pub exe: String,
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl Default for PageSize {
    fn default() -> Self {
        // US Letter, in points
        Self {
            width: 612.0,
            height: 792.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOut {
    pub page_count: u32,
    pub page_sizes: Vec<PageSize>,
}

/// Rectangle in PDF points, origin at the top-left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub fn bottom_band(size: PageSize, fraction: f64) -> Self {
        let fraction = fraction.clamp(0.0, 1.0);
        let height = size.height * fraction;
        Self {
            x: 0.0,
            y: size.height - height,
            width: size.width,
            height,
        }
    }

    /// Pixel rectangle at `dpi`, as (x, y, w, h).
    pub fn to_pixels(&self, dpi: u32) -> (u32, u32, u32, u32) {
        let scale = dpi as f64 / 72.0;
        let px = |v: f64| (v * scale).round().max(0.0) as u32;
        (px(self.x), px(self.y), px(self.width).max(1), px(self.height).max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcrLayout {
    Block,
    SingleLine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrRequest {
    pub region: Option<Region>,
    pub dpi: u32,
    pub layout: OcrLayout,
}

/// 0-based, inclusive page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn contains(&self, page: u32) -> bool {
        page >= self.start && page <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitTarget {
    pub file_name: String,
    pub range: PageRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitChunk {
    pub file_name: String,
    pub range: PageRange,
    pub path: String,
}
