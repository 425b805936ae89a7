//! Plotting collaborator - line graphs drawn into the current window
//!
//! Kept separate from [`UiState`](super::UiState) because plotting carries
//! its own per-context state; the registry swaps both together so a plot
//! call can never land in another context's frame.

use bitflags::bitflags;

use crate::core::{ColorF, Rect, Vec2};
use crate::ui::UiState;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GraphFlags: u32 {
        const SHADED = 1 << 0;
    }
}

/// One data series of a graph.
#[derive(Debug, Clone, Default)]
pub struct GraphValues {
    pub label: String,
    pub y_axis: Vec<f64>,
    pub flags: GraphFlags,
}

/// Graph frame: axis labels, limits and the shared x axis.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub title: String,
    pub x_axis_label: String,
    pub y_axis_label: String,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub x_axis: Vec<f64>,
    pub extra_label: Option<String>,
}

const PLOT_SIZE: Vec2 = Vec2 { x: 280.0, y: 120.0 };
const LINE_THICKNESS: f32 = 1.5;

/// Per-context plotting state.
#[derive(Debug, Default)]
pub struct PlotState {
    plots_drawn: u64,
}

impl PlotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plots_drawn(&self) -> u64 {
        self.plots_drawn
    }

    /// Draw `graph` with its value series into the current window. Series
    /// are rendered as polylines (a thin quad per segment); shading is
    /// approximated by a translucent fill quad under the series.
    pub fn plot_graph(&mut self, ui: &mut UiState, graph: &Graph, values: &[GraphValues]) {
        if !ui.has_open_window() {
            log::warn!("plot_graph({:?}) outside begin()/end()", graph.title);
            return;
        }
        let origin = ui.cursor();
        let area = Rect::from_pos_size(origin, PLOT_SIZE);
        ui.add_quad(area, ColorF::new(0.12, 0.13, 0.14, 1.0));

        let span_x = (graph.max_x - graph.min_x).max(f64::EPSILON);
        let span_y = (graph.max_y - graph.min_y).max(f64::EPSILON);
        let project = |x: f64, y: f64| {
            Vec2::new(
                origin.x + (((x - graph.min_x) / span_x) as f32) * PLOT_SIZE.x,
                origin.y + PLOT_SIZE.y - (((y - graph.min_y) / span_y) as f32) * PLOT_SIZE.y,
            )
        };

        for series in values {
            let n = series.y_axis.len().min(graph.x_axis.len());
            if series.flags.contains(GraphFlags::SHADED) {
                for i in 0..n {
                    let p = project(graph.x_axis[i], series.y_axis[i]);
                    let fill = Rect {
                        min: p,
                        max: Vec2::new(p.x + PLOT_SIZE.x / n.max(1) as f32, origin.y + PLOT_SIZE.y),
                    };
                    ui.add_quad(fill, ColorF::new(0.23, 0.44, 0.69, 0.25));
                }
            }
            for w in 0..n.saturating_sub(1) {
                let a = project(graph.x_axis[w], series.y_axis[w]);
                let b = project(graph.x_axis[w + 1], series.y_axis[w + 1]);
                let seg = Rect {
                    min: Vec2::new(a.x.min(b.x), a.y.min(b.y) - LINE_THICKNESS * 0.5),
                    max: Vec2::new(a.x.max(b.x).max(a.x.min(b.x) + LINE_THICKNESS), a.y.max(b.y) + LINE_THICKNESS * 0.5),
                };
                ui.add_quad(seg, ColorF::new(0.23, 0.44, 0.69, 1.0));
            }
        }

        self.plots_drawn += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_counts_draws() {
        let mut ui = UiState::new();
        let mut plot = PlotState::new();
        ui.new_frame(0.016);
        ui.begin("Graphs");
        let graph = Graph {
            title: "fps".into(),
            min_x: 0.0,
            max_x: 2.0,
            min_y: 0.0,
            max_y: 1.0,
            x_axis: vec![0.0, 1.0, 2.0],
            ..Default::default()
        };
        let series = GraphValues {
            label: "frame".into(),
            y_axis: vec![0.1, 0.9, 0.4],
            ..Default::default()
        };
        plot.plot_graph(&mut ui, &graph, &[series]);
        ui.end();
        assert_eq!(plot.plots_drawn(), 1);

        // frame quad + 2 segments on top of window chrome
        let frame = ui.finalize();
        let (_, vertices, _) = &frame.lists[0];
        assert_eq!(vertices.len(), (2 + 1 + 2) * 4);
    }
}
