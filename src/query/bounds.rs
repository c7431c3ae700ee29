//! Min/max of the measured fields across one page of results

use serde::Serialize;

use crate::record::Galaxy;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    fn widen(range: &mut Option<Range>, v: f64) {
        match range {
            Some(r) => {
                r.min = r.min.min(v);
                r.max = r.max.max(v);
            }
            None => *range = Some(Range { min: v, max: v }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBounds {
    pub ra: Option<Range>,
    pub dec: Option<Range>,
    pub reff: Option<Range>,
    pub q: Option<Range>,
    pub pa: Option<Range>,
    pub mag: Option<Range>,
    pub mean_mue: Option<Range>,
    pub nucleus_count: usize,
    pub total: usize,
}

impl PageBounds {
    /// Absent `mag` / `meanMue` values are ignored
    pub fn compute<'a>(galaxies: impl IntoIterator<Item = &'a Galaxy>) -> Self {
        let mut bounds = PageBounds::default();
        for g in galaxies {
            Range::widen(&mut bounds.ra, g.ra);
            Range::widen(&mut bounds.dec, g.dec);
            Range::widen(&mut bounds.reff, g.reff);
            Range::widen(&mut bounds.q, g.q);
            Range::widen(&mut bounds.pa, g.pa);
            if let Some(mag) = g.mag {
                Range::widen(&mut bounds.mag, mag);
            }
            if let Some(mue) = g.mean_mue {
                Range::widen(&mut bounds.mean_mue, mue);
            }
            if g.nucleus {
                bounds.nucleus_count += 1;
            }
            bounds.total += 1;
        }
        bounds
    }
}
