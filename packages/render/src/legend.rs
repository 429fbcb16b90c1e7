//! Static intensity legend.

use std::fmt::Write as _;

use fire_map_detection_models::{IntensityThresholds, IntensityTier};

use crate::html::escape;

/// Legend placement and look, resized for small and large screens. The
/// legend markup carries no inline position or size so these rules apply.
pub const LEGEND_CSS: &str = "\
.legend {
  position: fixed; bottom: 30px; left: 30px; width: 250px; font-size: 14px;
  background-color: white; border-radius: 8px; box-shadow: 0 4px 8px rgba(0, 0, 0, 0.3);
  z-index: 9999; padding: 10px 15px; line-height: 1.4; border: 2px solid #ccc;
}
@media (max-width: 600px) {
  .legend { width: 150px; font-size: 12px; bottom: 20px; left: 20px; }
}
@media (min-width: 601px) {
  .legend { width: 200px; font-size: 14px; bottom: 50px; left: 50px; }
}";

/// Builds the fixed-position legend listing every tier with its color and
/// FRP range.
///
/// # Errors
///
/// Returns [`std::fmt::Error`] if writing to the buffer fails.
pub fn legend_html(thresholds: IntensityThresholds) -> Result<String, std::fmt::Error> {
    let mut buf = String::new();

    buf.push_str(
        "<div class=\"legend\">\n\
         <b style=\"font-size: 16px; margin-bottom: 6px; display: block;\">Active Fire Intensity</b>\n",
    );

    for tier in IntensityTier::DESCENDING {
        writeln!(
            buf,
            "<div style=\"margin-bottom: 4px;\"><i style=\"background: {}; border-radius: 50%; \
             width: 14px; height: 14px; display: inline-block; margin-right: 6px;\"></i> {} ({})</div>",
            tier.style().color,
            tier.label(),
            escape(&tier.range_label(thresholds))
        )?;
    }

    buf.push_str("</div>\n");
    Ok(buf)
}
