//! Entity selection and chart figures.
//!
//! Everything here is a pure function of the loaded series and the two UI
//! selections; nothing is written back.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::data::series::DeltaRecord;
use crate::logging::log_view_request;

/// Values offered by the axis toggle, in display order.
pub const TOGGLE_OPTIONS: [&str; 2] = ["Linear", "Log"];
pub const Y_AXIS_TITLE: &str = "New Cases";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisScale {
    #[default]
    Linear,
    Logarithmic,
}

impl AxisScale {
    /// "Log" selects the logarithmic axis; anything else is linear.
    pub fn from_toggle(value: &str) -> Self {
        match value {
            "Log" => AxisScale::Logarithmic,
            _ => AxisScale::Linear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AxisScale::Linear => "linear",
            AxisScale::Logarithmic => "logarithmic",
        }
    }

    /// Axis `type` understood by the chart renderer.
    pub fn plot_axis_type(&self) -> &'static str {
        match self {
            AxisScale::Linear => "linear",
            AxisScale::Logarithmic => "log",
        }
    }
}

pub fn axis_scale(toggle: &str) -> AxisScale {
    AxisScale::from_toggle(toggle)
}

/// Rows of one entity, in their stored order. Unknown entities select nothing.
pub fn select_entity<'a>(series: &'a [DeltaRecord], entity: &str) -> Vec<&'a DeltaRecord> {
    series.iter().filter(|r| r.entity == entity).collect()
}

/// Query parameters sent by the dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selection {
    pub entity: Option<String>,
    pub scale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartView {
    pub label: String,
    pub scale: AxisScale,
    pub points: Vec<ChartPoint>,
}

impl ChartView {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Line-and-marker figure description for the dashboard's chart.
    pub fn to_figure(&self) -> Value {
        let x: Vec<String> = self.points.iter().map(|p| p.date.to_string()).collect();
        let y: Vec<Value> = self.points.iter().map(|p| json!(p.value)).collect();
        json!({
            "data": [{
                "x": x,
                "y": y,
                "name": self.label,
                "mode": "lines+markers",
                "marker": {
                    "size": 15,
                    "opacity": 0.5,
                    "line": {"width": 0.5, "color": "white"}
                }
            }],
            "layout": {
                "yaxis": {
                    "title": Y_AXIS_TITLE,
                    "type": self.scale.plot_axis_type()
                },
                "margin": {"l": 60, "b": 40, "t": 10, "r": 0},
                "hovermode": "closest"
            }
        })
    }
}

pub fn render(series: &[DeltaRecord], entity: &str, toggle: &str) -> ChartView {
    let scale = axis_scale(toggle);
    let points: Vec<ChartPoint> = select_entity(series, entity)
        .into_iter()
        .map(|r| ChartPoint {
            date: r.date,
            value: r.new_cases,
        })
        .collect();
    log_view_request(entity, scale.as_str(), points.len());
    ChartView {
        label: entity.to_string(),
        scale,
        points,
    }
}
