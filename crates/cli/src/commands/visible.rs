//! `pageflow visible`: visibility over a recorded layout.

use anyhow::{Context, Result, bail};
use pageflow_core::AppConfig;
use pageflow_core::geometry::{Evaluator, Node, Viewport, VisibilityQuery};
use serde_json::{Value, json};
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
pub struct VisibleArgs {
    /// JSON file holding an array of nodes.
    pub nodes: PathBuf,

    /// Viewport size as WIDTHxHEIGHT.
    #[arg(long, default_value = "1280x720")]
    pub viewport: String,

    /// Ignore geometry, check computed style only.
    #[arg(long, conflicts_with_all = ["only_outside", "outside_limit"])]
    pub style_only: bool,

    /// Select elements outside the extended viewport.
    #[arg(long)]
    pub only_outside: bool,

    /// With --only-outside, require a hit on the outer limit ring.
    #[arg(long, requires = "only_outside")]
    pub outside_limit: bool,

    /// Stop after this many matches.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl VisibleArgs {
    fn query(&self) -> VisibilityQuery {
        VisibilityQuery {
            check_viewport: !self.style_only,
            only_outside: self.only_outside,
            use_outside_limit: self.outside_limit,
        }
    }
}

pub fn run(config: &AppConfig, args: VisibleArgs) -> Result<Value> {
    let viewport = parse_viewport(&args.viewport)?;
    let raw = std::fs::read_to_string(&args.nodes).with_context(|| format!("reading {}", args.nodes.display()))?;
    let nodes: Vec<Node> = serde_json::from_str(&raw).with_context(|| format!("parsing {}", args.nodes.display()))?;

    Ok(evaluate(Evaluator::new(viewport, config.geometry), &nodes, args.query(), args.limit))
}

fn evaluate(evaluator: Evaluator, nodes: &[Node], query: VisibilityQuery, limit: Option<usize>) -> Value {
    let visible = evaluator.get_all_visible(nodes, query, limit);

    json!({
        "viewport": evaluator.viewport(),
        "extended_viewport": evaluator.extended_viewport(),
        "outside_limit": evaluator.outside_limit(),
        "total": nodes.len(),
        "first": evaluator.get_first_visible(nodes, query),
        "count": visible.len(),
        "visible": visible,
    })
}

fn parse_viewport(input: &str) -> Result<Viewport> {
    let Some((width, height)) = input.split_once(['x', 'X']) else {
        bail!("viewport must look like WIDTHxHEIGHT, got {input:?}");
    };
    let width: f64 = width.trim().parse().with_context(|| format!("bad viewport width {width:?}"))?;
    let height: f64 = height.trim().parse().with_context(|| format!("bad viewport height {height:?}"))?;
    if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
        bail!("viewport dimensions must be positive, got {input:?}");
    }
    Ok(Viewport::new(width, height))
}
