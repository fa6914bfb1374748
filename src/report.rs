//! Terminal summary of the per-subsystem time accumulators.

use std::cmp::Reverse;
use std::cmp::max;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::time::Duration;

use colored::Color;
use colored::Colorize;
use itertools::Itertools;
use strum::IntoEnumIterator;
use unicode_width::UnicodeWidthStr;

use crate::counts;
use crate::counts::accumulated;
use crate::owner::Owner;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
enum Weight {
    LikeNothing,
    VeryLittle,
    Light,
    Noticeable,
    Heavy,
    Massive,
    SuperMassive,
}

impl Weight {
    /// Assign a weight based on a share of total time, a number between 0 and 1.
    fn weigh(share: f64) -> Weight {
        match share {
            s if s >= 0.4 => Weight::SuperMassive,
            s if s >= 0.3 => Weight::Massive,
            s if s >= 0.2 => Weight::Heavy,
            s if s >= 0.1 => Weight::Noticeable,
            s if s >= 0.07 => Weight::Light,
            s if s >= 0.04 => Weight::VeryLittle,
            _ => Weight::LikeNothing,
        }
    }

    fn color(self) -> Color {
        let [r, g, b] = match self {
            Self::LikeNothing => [120; 3],
            Self::VeryLittle => [200; 3],
            Self::Light => [255; 3],
            Self::Noticeable => [255, 255, 120],
            Self::Heavy => [255, 150, 0],
            Self::Massive => [255, 75, 0],
            Self::SuperMassive => [255, 0, 0],
        };

        Color::TrueColor { r, g, b }
    }
}

/// One subsystem's line in the summary.
#[derive(Debug, Clone)]
struct ReportRow {
    owner: Owner,
    time: Duration,
    share: f64,
}

/// A snapshot of the time accumulators, renderable through [`Display`].
///
/// Totals keep growing after the snapshot; capture again for fresh numbers.
#[derive(Debug, Clone)]
pub struct CountsReport {
    rows: Vec<ReportRow>,
    total: Duration,
}

impl CountsReport {
    /// Snapshot every subsystem's accumulated time.
    ///
    /// When [`init`][crate::init] has marked an epoch, wall time since then
    /// that no zone covered is attributed to [`Owner::Root`]. Subsystems
    /// that never recorded time are left out of the report entirely.
    pub fn capture() -> Self {
        let mut times = Owner::iter()
            .map(|owner| (owner, accumulated(owner)))
            .collect_vec();
        let tracked: Duration = times.iter().map(|&(_, time)| time).sum();
        let total = match counts::elapsed_since_init() {
            Some(elapsed) => {
                times[Owner::Root.index()].1 += elapsed.saturating_sub(tracked);
                max(elapsed, tracked)
            }
            None => tracked,
        };

        let rows = times
            .into_iter()
            .filter(|&(_, time)| !time.is_zero())
            .map(|(owner, time)| ReportRow {
                owner,
                time,
                share: time.as_secs_f64() / total.as_secs_f64(),
            })
            .sorted_by_key(|row| Reverse(row.time))
            .collect();

        Self { rows, total }
    }
}

/// Line up the fractional part of `format!("{time:.2?}")` across rows.
fn display_time_aligned(time: Duration) -> String {
    let unaligned_time = format!("{time:.2?}");
    let time_components: Vec<_> = unaligned_time.split('.').collect();
    if time_components.len() != 2 {
        return unaligned_time;
    }

    format!("{:>3}.{:<4}", time_components[0], time_components[1])
}

impl Display for CountsReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.rows.is_empty() {
            return writeln!(f, "no timing zones were recorded");
        }

        let max_name_width = self
            .rows
            .iter()
            .map(|row| row.owner.name().width())
            .max()
            .unwrap_or_default();

        let title = "### subsystem timings".bold();
        let max_width = max(max_name_width, title.width());
        let title = format!("{title:<max_width$}");
        let total_time = display_time_aligned(self.total).bold();
        let share_title = "Share".bold();
        writeln!(f, "{title}   {total_time}   {share_title}")?;

        for row in &self.rows {
            let color = Weight::weigh(row.share).color();
            let name = format!("{:<max_width$}", row.owner.name()).color(color);
            let time = format!("{:<10}", display_time_aligned(row.time)).color(color);
            let share = format!("{:>6}", format!("{:2.2}%", 100.0 * row.share)).color(color);
            writeln!(f, "{name}   {time}  {share}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prop_assert;
    use test_strategy::proptest;

    use crate::counts::fold;

    use super::*;

    #[test]
    fn rows_are_sorted_by_descending_time() {
        colored::control::set_override(false);
        counts::mark_epoch();
        fold(Owner::ImageSave, Duration::from_millis(400));
        fold(Owner::ImageLoad, Duration::from_millis(1));

        let rendered = CountsReport::capture().to_string();
        let save_at = rendered.find("IMAGE_SAVE").unwrap();
        let load_at = rendered.find("IMAGE_LOAD").unwrap();
        assert!(save_at < load_at);
        assert!(rendered.contains('%'));
    }

    #[test]
    fn an_empty_report_says_so() {
        let report = CountsReport {
            rows: vec![],
            total: Duration::ZERO,
        };
        assert_eq!("no timing zones were recorded\n", report.to_string());
    }

    #[test]
    fn times_align_on_the_decimal_point() {
        assert_eq!("400.00ms", display_time_aligned(Duration::from_millis(400)));
        assert_eq!("  1.50s ", display_time_aligned(Duration::from_millis(1500)));
        assert_eq!("250.00µs", display_time_aligned(Duration::from_micros(250)));
    }

    #[test]
    fn extreme_shares_hit_the_extreme_weights() {
        assert_eq!(Weight::SuperMassive, Weight::weigh(1.0));
        assert_eq!(Weight::LikeNothing, Weight::weigh(0.0));
    }

    #[proptest]
    fn weight_never_decreases_with_share(
        #[strategy(0.0..=1.0_f64)] a: f64,
        #[strategy(0.0..=1.0_f64)] b: f64,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(Weight::weigh(lo) <= Weight::weigh(hi));
    }
}
