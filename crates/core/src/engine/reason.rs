use crate::domain::row::PriceSide;
use crate::engine::table::PricedRow;
use crate::strategy::fmt_dp;

/// Builds the audit string tracing a row's final price back to its inputs.
pub fn build_reason(priced: &PricedRow) -> String {
    let mut parts = Vec::with_capacity(4);

    parts.push(match priced.resolution(PriceSide::Base) {
        Some(resolution) => format!("Base: {}", resolution.explain(PriceSide::Base)),
        None => "Base: not resolved".to_string(),
    });

    if let Some(clip) = &priced.clip_adjustment {
        let bound_source = priced
            .resolution(clip.bound)
            .and_then(|resolution| resolution.description())
            .unwrap_or("no description");
        let mut note = format!(
            "clipped from {} to {} by the {} bound ({bound_source})",
            fmt_dp(clip.from, 2),
            fmt_dp(clip.to, 2),
            clip.bound
        );
        if clip.inverted_bounds {
            if let (Some(lower), Some(upper)) = (priced.new_price_lower, priced.new_price_upper) {
                note.push_str(&format!(
                    ", lower bound {} exceeds upper bound {} so the upper bound applies",
                    fmt_dp(lower, 2),
                    fmt_dp(upper, 2)
                ));
            }
        }
        parts.push(note);
    }

    if let (Some(clipped), Some(rounded)) = (priced.price_after_clip, priced.price_after_rounding)
    {
        if clipped != rounded {
            parts.push(format!("rounded from {} to {}", fmt_dp(clipped, 2), fmt_dp(rounded, 2)));
        }
    }

    if let Some(line) = &priced.line_adjustment {
        let previous = match line.previous {
            Some(previous) => format!("was {}", fmt_dp(previous, 2)),
            None => "no individual price".to_string(),
        };
        parts.push(format!(
            "aligned to line {} maximum {} in region {} ({previous})",
            line.line,
            fmt_dp(line.line_price, 2),
            priced.row.region
        ));
    }

    if priced.new_price_final.is_none() {
        parts.push("no final price".to_string());
    }

    parts.join("; ")
}

pub fn build_reasons(mut rows: Vec<PricedRow>) -> Vec<PricedRow> {
    for priced in &mut rows {
        priced.reason = Some(build_reason(priced));
    }
    rows
}
