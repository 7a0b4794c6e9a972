//! HTML rendering of prediction records into the weekly report.
//!
//! Rendering is deterministic: the same sections and [`ReportMeta`] always produce the same
//! bytes. The footer year is the only wall-clock value and is supplied by the caller.
//!
//! Absent or empty fields never render as placeholders; the element that would hold them is
//! left out. Values are interpolated verbatim without escaping.

use crate::constants::REPORT_TITLE;
use crate::record::{CourseProfile, Pick, PickStats, StructuredRecord};

const STYLES: &str = r#"
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Arial, sans-serif; background: #f0f9ff; margin: 0; padding: 20px; }
    .container { max-width: 600px; margin: 0 auto; background: white; border-radius: 12px; overflow: hidden; box-shadow: 0 4px 6px rgba(0,0,0,0.1); }
    .header { background: linear-gradient(135deg, #16a34a 0%, #15803d 100%); color: white; padding: 30px 20px; text-align: center; }
    .header h1 { margin: 0 0 10px 0; font-size: 28px; }
    .header p { margin: 0; opacity: 0.9; font-size: 16px; }
    .content { padding: 30px 20px; }
    .tour-section { margin: 30px 0; padding: 25px; background: #f9fafb; border-left: 4px solid #16a34a; border-radius: 8px; }
    .tour-section h2 { margin: 0 0 15px 0; color: #1f2937; font-size: 22px; }
    .tournament { margin: 10px 0; color: #374151; }
    .tour-info { margin: 15px 0; padding: 15px; background: white; border-radius: 6px; border: 1px solid #e5e7eb; }
    .tour-info p { margin: 5px 0; font-size: 14px; color: #4b5563; }
    .tour-info strong { color: #1f2937; }
    .course-features { margin: 15px 0; padding: 15px; background: #fef3c7; border-left: 3px solid #f59e0b; border-radius: 6px; }
    .course-features h4 { margin: 0 0 10px 0; color: #92400e; font-size: 14px; }
    .course-features ul { margin: 0; padding-left: 20px; color: #78350f; }
    .course-features li { margin: 5px 0; font-size: 13px; }
    .skills-title { font-size: 13px; font-weight: bold; color: #166534; margin-bottom: 8px; }
    .skills { display: flex; flex-wrap: wrap; gap: 8px; margin: 15px 0; }
    .skill-tag { background: #dcfce7; color: #166534; padding: 6px 12px; border-radius: 20px; font-size: 12px; font-weight: 600; }
    .picks-title { margin: 25px 0 15px 0; color: #1f2937; font-size: 18px; }
    .pick { margin: 20px 0; padding: 20px; background: white; border: 2px solid #e5e7eb; border-radius: 8px; }
    .pick-header { display: flex; justify-content: space-between; align-items: center; margin-bottom: 15px; flex-wrap: wrap; gap: 10px; }
    .player-name { font-size: 18px; font-weight: bold; color: #1f2937; }
    .rank-badge { display: inline-block; width: 28px; height: 28px; line-height: 28px; text-align: center; border-radius: 50%; font-weight: bold; font-size: 14px; margin-right: 10px; }
    .rank-1 { background: #fbbf24; color: #78350f; }
    .rank-2 { background: #d1d5db; color: #1f2937; }
    .rank-3 { background: #fb923c; color: #7c2d12; }
    .rank-other { background: #dbeafe; color: #1e40af; }
    .odds { background: #16a34a; color: white; padding: 8px 16px; border-radius: 20px; font-weight: bold; font-size: 16px; }
    .info-box { margin: 12px 0; padding: 12px; border-radius: 6px; font-size: 14px; line-height: 1.6; }
    .coursefit-box { background: #dbeafe; border-left: 3px solid #2563eb; color: #1e3a8a; }
    .stats-grid { display: grid; grid-template-columns: repeat(2, 1fr); gap: 10px; margin: 12px 0; }
    .stat-box { background: white; border: 1px solid #e5e7eb; padding: 10px; border-radius: 6px; text-align: center; }
    .stat-label { font-size: 11px; color: #6b7280; text-transform: uppercase; margin-bottom: 4px; }
    .stat-value { font-size: 16px; font-weight: bold; color: #1f2937; }
    .form-box { background: #f3e8ff; border-left: 3px solid #9333ea; color: #581c87; }
    .why { margin: 12px 0 0 0; color: #4b5563; font-size: 14px; line-height: 1.6; }
    .disclaimer { background: #fef2f2; border: 1px solid #fecaca; padding: 15px; border-radius: 6px; margin: 20px 0; }
    .disclaimer p { margin: 0; color: #991b1b; font-size: 13px; }
    .footer { margin-top: 40px; padding: 20px; text-align: center; background: #f9fafb; border-top: 1px solid #e5e7eb; }
    .footer p { margin: 8px 0; color: #6b7280; font-size: 12px; }
"#;

const DISCLAIMER: &str = "These predictions are for informational purposes only. Past performance does not guarantee future results. Please gamble responsibly and within your means.";

/// One report section: a record (possibly missing) and its heading.
#[derive(Debug, Clone, Copy)]
pub struct ReportSection<'a> {
    pub record: Option<&'a StructuredRecord>,
    pub caption: &'a str,
}

/// Report-level metadata. `caption` is the date line under the title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportMeta {
    pub caption: String,
    pub footer_year: i32,
}

/// The finished report handed to delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeReport {
    pub caption: String,
    pub html: String,
    /// Number of sections actually rendered.
    pub sections: usize,
}

/// Present, non-empty text.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn rank_class(rank: Option<i64>) -> &'static str {
    match rank {
        Some(1) => "rank-1",
        Some(2) => "rank-2",
        Some(3) => "rank-3",
        _ => "rank-other",
    }
}

/// Stateless HTML renderer for the weekly report.
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Renders all sections in order into one document.
    pub fn render(&self, sections: &[ReportSection<'_>], meta: &ReportMeta) -> CompositeReport {
        let rendered: Vec<String> = sections
            .iter()
            .filter_map(|section| self.render_section(section.record, section.caption))
            .collect();

        let mut output = String::new();
        output.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        output.push_str("<meta charset=\"utf-8\">\n");
        output.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        output.push_str(&format!("<style>{STYLES}</style>\n"));
        output.push_str("</head>\n<body>\n<div class=\"container\">\n");

        output.push_str("<div class=\"header\">\n");
        output.push_str(&format!("<h1>{REPORT_TITLE}</h1>\n"));
        output.push_str(&format!("<p>{}</p>\n", meta.caption));
        output.push_str("</div>\n");

        output.push_str("<div class=\"content\">\n");
        for section in &rendered {
            output.push_str(section);
        }
        output.push_str(&format!(
            "<div class=\"disclaimer\"><p><strong>⚠️ Disclaimer:</strong> {DISCLAIMER}</p></div>\n"
        ));
        output.push_str("</div>\n");

        output.push_str("<div class=\"footer\">\n");
        output.push_str("<p><strong>Powered by Claude AI</strong></p>\n");
        output.push_str(
            "<p>Data Sources: DataGolf • OddsChecker • Weather.com • PGA/DP World Tour</p>\n",
        );
        output.push_str(&format!(
            "<p>© {} Golf AI Predictions</p>\n",
            meta.footer_year
        ));
        output.push_str("</div>\n</div>\n</body>\n</html>\n");

        CompositeReport {
            caption: meta.caption.clone(),
            html: output,
            sections: rendered.len(),
        }
    }

    /// Renders one tour section, or `None` when there is no record or it has no picks.
    pub fn render_section(&self, record: Option<&StructuredRecord>, caption: &str) -> Option<String> {
        let record = record.filter(|r| !r.value_picks.is_empty())?;

        let mut output = String::new();
        output.push_str("<div class=\"tour-section\">\n");
        output.push_str(&format!("<h2>{caption}</h2>\n"));
        output.push_str(&format!(
            "<h3 class=\"tournament\">{}</h3>\n",
            present(&record.tournament).unwrap_or("Tournament")
        ));

        self.push_tour_info(&mut output, record);
        if let Some(profile) = &record.course_profile {
            self.push_course_features(&mut output, profile);
            self.push_favored_skills(&mut output, profile);
        }

        output.push_str("<h3 class=\"picks-title\">💰 Value Picks (20/1+ Odds)</h3>\n");
        for pick in &record.value_picks {
            self.push_pick(&mut output, pick);
        }
        output.push_str("</div>\n");
        Some(output)
    }

    fn push_tour_info(&self, output: &mut String, record: &StructuredRecord) {
        let mut lines = Vec::new();
        if let Some(course) = present(&record.course) {
            lines.push(format!("<p><strong>Course:</strong> {course}</p>"));
        }
        if let Some(location) = present(&record.location) {
            lines.push(format!("<p><strong>Location:</strong> {location}</p>"));
        }
        if let Some(dates) = present(&record.dates) {
            lines.push(format!("<p><strong>Dates:</strong> {dates}</p>"));
        }
        if let Some(profile) = &record.course_profile {
            let parts: Vec<String> = [
                present(&profile.par).map(|par| format!("<strong>Par:</strong> {par}")),
                present(&profile.length).map(|len| format!("<strong>Length:</strong> {len}")),
            ]
            .into_iter()
            .flatten()
            .collect();
            if !parts.is_empty() {
                lines.push(format!("<p>{}</p>", parts.join(" • ")));
            }
        }
        if let Some(weather) = present(&record.weather) {
            lines.push(format!("<p><strong>Weather:</strong> {weather}</p>"));
        }

        if lines.is_empty() {
            return;
        }
        output.push_str("<div class=\"tour-info\">\n");
        for line in lines {
            output.push_str(&line);
            output.push('\n');
        }
        output.push_str("</div>\n");
    }

    fn push_course_features(&self, output: &mut String, profile: &CourseProfile) {
        if profile.key_features.is_empty() {
            return;
        }
        output.push_str("<div class=\"course-features\">\n<h4>🏌️ Course Features</h4>\n<ul>\n");
        for feature in &profile.key_features {
            output.push_str(&format!("<li>{feature}</li>\n"));
        }
        output.push_str("</ul>\n</div>\n");
    }

    fn push_favored_skills(&self, output: &mut String, profile: &CourseProfile) {
        if profile.favored_skills.is_empty() {
            return;
        }
        output.push_str("<div class=\"skills-block\">\n");
        output.push_str("<p class=\"skills-title\">✅ SKILLS NEEDED:</p>\n<div class=\"skills\">\n");
        for skill in &profile.favored_skills {
            output.push_str(&format!("<span class=\"skill-tag\">{skill}</span>\n"));
        }
        output.push_str("</div>\n</div>\n");
    }

    fn push_pick(&self, output: &mut String, pick: &Pick) {
        output.push_str("<div class=\"pick\">\n<div class=\"pick-header\">\n");
        output.push_str(&format!(
            "<div class=\"player-name\"><span class=\"rank-badge {}\">{}</span>{}</div>\n",
            rank_class(pick.rank),
            pick.rank.map(|r| r.to_string()).unwrap_or_default(),
            present(&pick.player).unwrap_or_default()
        ));
        if let Some(odds) = present(&pick.odds) {
            output.push_str(&format!("<div class=\"odds\">{odds}</div>\n"));
        }
        output.push_str("</div>\n");

        if let Some(coursefit) = present(&pick.coursefit) {
            output.push_str(&format!(
                "<div class=\"info-box coursefit-box\"><strong>Course Fit:</strong> {coursefit}</div>\n"
            ));
        }
        if let Some(stats) = &pick.stats {
            self.push_stats_grid(output, stats);
            if let Some(form) = present(&stats.recent_form) {
                output.push_str(&format!(
                    "<div class=\"info-box form-box\"><strong>Recent Form:</strong> {form}</div>\n"
                ));
            }
        }
        if let Some(why) = present(&pick.why) {
            output.push_str(&format!("<p class=\"why\">{why}</p>\n"));
        }
        output.push_str("</div>\n");
    }

    fn push_stats_grid(&self, output: &mut String, stats: &PickStats) {
        let cells: Vec<String> = [
            ("Driving Acc", &stats.driving_acc),
            ("GIR %", &stats.gir),
            ("SG: Approach", &stats.sg_approach),
            ("SG: Putting", &stats.sg_putting),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            present(value).map(|value| {
                format!(
                    "<div class=\"stat-box\"><div class=\"stat-label\">{label}</div><div class=\"stat-value\">{value}</div></div>"
                )
            })
        })
        .collect();

        if cells.is_empty() {
            return;
        }
        output.push_str("<div class=\"stats-grid\">\n");
        for cell in cells {
            output.push_str(&cell);
            output.push('\n');
        }
        output.push_str("</div>\n");
    }
}
