use crate::{
    config::Config,
    engine::{Engine, OcrLayout, OcrRequest, PageSize, Region},
    normalize::{text_len, Normalizer},
    probe::ProbeResult,
};
use std::path::Path;
use tracing::{debug, warn};

/// Page text for one document: native text layer first, OCR when the layer is
/// missing, too short, or the whole document was probed as scanned.
///
/// Engine failures never propagate; an unreadable page yields an empty string.
pub struct PageTextSource<'a> {
    cfg: &'a Config,
    engine: &'a dyn Engine,
    normalizer: &'a Normalizer,
    input: &'a Path,
    page_sizes: &'a [PageSize],
    page_count: u32,
    force_ocr: bool,
}

impl<'a> PageTextSource<'a> {
    pub fn new(
        cfg: &'a Config,
        engine: &'a dyn Engine,
        normalizer: &'a Normalizer,
        input: &'a Path,
        probe: &'a ProbeResult,
    ) -> Self {
        Self {
            cfg,
            engine,
            normalizer,
            input,
            page_sizes: &probe.page_sizes,
            page_count: probe.input.page_count,
            force_ocr: !probe.sample.machine_readable,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn forces_ocr(&self) -> bool {
        self.force_ocr
    }

    /// Page text honoring the per-document OCR decision.
    pub fn text(&self, page: u32) -> String {
        self.get_text(page, self.force_ocr)
    }

    pub fn get_text(&self, page: u32, force_ocr: bool) -> String {
        if !force_ocr {
            match self.engine.native_text(self.input, page, None) {
                Ok(t) if text_len(&t) >= self.cfg.text.min_text_chars => return t,
                Ok(t) => debug!("page {page}: native text too short ({} chars), using OCR", text_len(&t)),
                Err(err) => warn!("page {page}: native text failed: {err:#}"),
            }
        }
        self.ocr(page, None, self.cfg.ocr.page_dpi, OcrLayout::Block)
    }

    pub fn footer_native_text(&self, page: u32) -> String {
        let region = self.footer_region(page);
        match self.engine.native_text(self.input, page, Some(&region)) {
            Ok(t) => t,
            Err(err) => {
                warn!("page {page}: footer text failed: {err:#}");
                String::new()
            }
        }
    }

    /// OCR of the footer band at the higher footer resolution. A block layout
    /// is tried first, then a single text line.
    pub fn footer_ocr_text(&self, page: u32) -> String {
        let region = self.footer_region(page);
        let dpi = self.cfg.ocr.footer_dpi;
        let block = self.ocr(page, Some(region), dpi, OcrLayout::Block);
        if text_len(&block) > 0 {
            return block;
        }
        self.ocr(page, Some(region), dpi, OcrLayout::SingleLine)
    }

    fn footer_region(&self, page: u32) -> Region {
        let size = self
            .page_sizes
            .get(page as usize)
            .copied()
            .unwrap_or_default();
        Region::bottom_band(size, self.cfg.text.footer_fraction)
    }

    fn ocr(&self, page: u32, region: Option<Region>, dpi: u32, layout: OcrLayout) -> String {
        let req = OcrRequest { region, dpi, layout };
        match self.engine.ocr_text(self.input, page, &req) {
            Ok(raw) => self.normalizer.apply(&raw),
            Err(err) => {
                warn!("page {page}: OCR failed ({layout:?}): {err:#}");
                String::new()
            }
        }
    }
}
