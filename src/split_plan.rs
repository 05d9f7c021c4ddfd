use crate::{
    detect::BoundaryMap,
    engine::{PageRange, SplitTarget},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitPlan {
    pub page_count: u32,
    pub targets: Vec<SplitTarget>,
}

impl SplitPlan {
    /// Names and page ranges for every statement in `map`. Out-of-range pages
    /// are clamped to the document; empty ranges are dropped.
    pub fn from_boundaries(stem: &str, map: &BoundaryMap, page_count: u32) -> SplitPlan {
        let mut targets = Vec::new();
        if page_count == 0 {
            return SplitPlan {
                page_count,
                targets,
            };
        }
        let last = page_count - 1;

        match map {
            BoundaryMap::Starts(starts) => {
                let mut starts: Vec<u32> = starts.iter().copied().filter(|&s| s <= last).collect();
                starts.sort_unstable();
                starts.dedup();

                for (i, &start) in starts.iter().enumerate() {
                    let end = starts.get(i + 1).map(|next| next - 1).unwrap_or(last);
                    targets.push(SplitTarget {
                        file_name: format!("{stem}_document_{}.pdf", i + 1),
                        range: PageRange { start, end },
                    });
                }
            }
            BoundaryMap::Ranges(ranges) => {
                let mut seen: HashMap<String, u32> = HashMap::new();
                for r in ranges {
                    if r.start > last {
                        continue;
                    }
                    let end = r.end.min(last).max(r.start);
                    let id = r.id.to_string();
                    let n = seen.entry(id.clone()).or_insert(0);
                    *n += 1;
                    let label = if *n == 1 { id } else { format!("{id}_{n}") };
                    targets.push(SplitTarget {
                        file_name: format!("{stem}_statement_{label}.pdf"),
                        range: PageRange {
                            start: r.start,
                            end,
                        },
                    });
                }
            }
        }

        SplitPlan {
            page_count,
            targets,
        }
    }
}
