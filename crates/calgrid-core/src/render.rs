use std::io::{self, IsTerminal, Write};

use chrono::Weekday;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::layout::{Layout, LayoutBody};
use crate::view::{ViewState, VisibleRange, WEEK_DAYS, weekday_labels};

const DOT: &str = "•";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    week_start: Weekday,
}

impl Renderer {
    pub fn new(cfg: &Config, week_start: Weekday) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
            week_start,
        }
    }

    #[tracing::instrument(skip(self, layout), fields(mode = %layout.mode))]
    pub fn print_layout(&self, layout: &Layout) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_layout(&mut out, layout)
    }

    pub fn write_layout<W: Write>(&self, mut out: W, layout: &Layout) -> anyhow::Result<()> {
        let state = ViewState::new(layout.mode, layout.anchor);
        writeln!(out, "{}", self.paint(&state.period_label(self.week_start), "1"))?;
        writeln!(out)?;

        match &layout.body {
            LayoutBody::Month { .. } => self.write_month(&mut out, layout)?,
            LayoutBody::Timeline { .. } => self.write_timeline(&mut out, layout)?,
        }

        if layout.outside_range > 0 {
            writeln!(out)?;
            writeln!(
                out,
                "{} event(s) outside the visible range",
                layout.outside_range
            )?;
        }
        Ok(())
    }

    fn write_month<W: Write>(&self, out: &mut W, layout: &Layout) -> anyhow::Result<()> {
        let headers = weekday_labels(self.week_start)
            .iter()
            .map(|label| label.to_string())
            .collect::<Vec<_>>();

        let cells = layout
            .range
            .days()
            .map(|day| {
                let Some(indicator) = layout.indicator(day) else {
                    return day.format("%d").to_string();
                };
                let mut cell = format!("{} {}", day.format("%d"), DOT.repeat(indicator.visible_count));
                if indicator.overflow_count > 0 {
                    cell.push_str(&format!(" +{}", indicator.overflow_count));
                }
                let cell = cell.trim_end().to_string();
                if indicator.in_focus_month {
                    cell
                } else {
                    self.paint(&cell, "2")
                }
            })
            .collect::<Vec<_>>();

        let rows = cells
            .chunks(WEEK_DAYS as usize)
            .map(|week| week.to_vec())
            .collect::<Vec<_>>();

        write_table(out, headers, rows)
    }

    fn write_timeline<W: Write>(&self, out: &mut W, layout: &Layout) -> anyhow::Result<()> {
        let headers = vec![
            "Day".to_string(),
            "Time".to_string(),
            "Col".to_string(),
            "Title".to_string(),
        ];

        let mut rows = Vec::new();
        for day in layout.range.days() {
            for (geometry, event) in layout.blocks(day) {
                let time = if event.all_day {
                    "all day".to_string()
                } else {
                    format!(
                        "{}–{}",
                        clock(geometry.top_offset_minutes),
                        clock(geometry.bottom_minutes())
                    )
                };
                rows.push(vec![
                    self.paint(&day.format("%a %d").to_string(), "33"),
                    time,
                    format!("{}/{}", geometry.column + 1, geometry.column_count),
                    event.title.clone(),
                ]);
            }
        }

        if rows.is_empty() {
            writeln!(out, "no events")?;
            return Ok(());
        }
        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, state, url))]
    pub fn print_range(
        &self,
        state: &ViewState,
        range: &VisibleRange,
        url: &str,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "mode   {}", state.mode)?;
        writeln!(out, "label  {}", state.period_label(self.week_start))?;
        writeln!(
            out,
            "range  {} .. {} ({} days)",
            range.start,
            range.end,
            range.len_days()
        )?;
        writeln!(out, "query  {url}")?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
