// Session context: the loaded dataset plus the control parameters that
// parameterize every query. Built once per run and passed explicitly to the
// views instead of living in global state.
use crate::config::Config;
use crate::engine;
use crate::error::EngineError;
use crate::types::{Dataset, RegionFilter, SortKey};
use crate::util::parse_reference_date;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    pub region: RegionFilter,
    /// Display only; never affects computation.
    pub reference_date: NaiveDate,
    pub top_n: usize,
    pub sort_key: SortKey,
}

impl Controls {
    pub fn from_config(config: &Config) -> Result<Self> {
        let d = &config.display;
        let reference_date = parse_reference_date(&d.reference_date)
            .ok_or_else(|| anyhow!("invalid reference date '{}'", d.reference_date))?;
        Ok(Self {
            region: RegionFilter::parse(&d.region),
            reference_date,
            top_n: d.top_n,
            sort_key: SortKey::parse(&d.sort_by, &config.data.total_column),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    /// Full dataset as loaded.
    pub dataset: Dataset,
    /// Dataset restricted to the selected region; every view reads this.
    pub view: Dataset,
    pub controls: Controls,
    /// Fallbacks applied while resolving controls, shown to the user.
    pub notices: Vec<String>,
}

impl Session {
    /// Check the requested controls against the dataset. Stale selections
    /// fall back to defaults (all offices, total column) instead of failing.
    pub fn resolve(dataset: Dataset, requested: Controls) -> Self {
        let mut controls = requested;
        let mut notices = Vec::new();

        let view = match engine::filter_region(&dataset, &controls.region) {
            Ok(v) => v,
            Err(EngineError::UnknownOffice(name)) => {
                warn!("Unknown office '{}' in region filter; showing all offices", name);
                notices.push(format!("Office '{}' not found; showing all offices.", name));
                controls.region = RegionFilter::All;
                dataset.clone()
            }
            Err(e) => {
                warn!("Region filter failed: {}; showing all offices", e);
                controls.region = RegionFilter::All;
                dataset.clone()
            }
        };

        if let SortKey::Category(ref c) = controls.sort_key {
            if dataset.category_index(c).is_none() {
                warn!("Unknown sort key '{}'; ranking by total", c);
                notices.push(format!("Service '{}' not found; ranking by total.", c));
                controls.sort_key = SortKey::Total;
            }
        }

        debug!(
            "Session: region={} top_n={} offices_in_view={}",
            controls.region.label(),
            controls.top_n,
            view.office_count()
        );

        Self {
            dataset,
            view,
            controls,
            notices,
        }
    }
}
