use serde::Serialize;

use crate::feeds::FeedItem;
use crate::progress::DailyLesson;

const LAST_DAY_INSTRUCTION: &str =
    "ALERT: This is the LAST video. Warn user to update playlist ID.";
const COMPLETED_INSTRUCTION: &str =
    "ALERT: Playlist COMPLETED. Tell user to update ActiveConfig.";

const LAST_DAY_BANNER: &str = r#"<div style="background: #ffebee; color: #c62828; padding: 15px; border-radius: 8px; margin-bottom: 20px; border: 1px solid #ef9a9a;"><strong>⚠️ Course Finishing Today!</strong><br>Please update your Playlist ID in the store tomorrow to start a new topic.</div>"#;
const COMPLETED_BANNER: &str = r#"<div style="background: #e3f2fd; color: #1565c0; padding: 15px; border-radius: 8px; margin-bottom: 20px; border: 1px solid #90caf9;"><strong>🛑 Playlist Completed</strong><br>You have finished this course. Update your active config to start a new one!</div>"#;

/// Everything the model sees about today.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub lesson: Option<DailyLesson>,
    pub news: Vec<FeedItem>,
    pub is_last_day: bool,
    pub completed: bool,
}

impl ReportContext {
    fn alert(&self) -> (&'static str, &'static str) {
        if self.completed {
            (COMPLETED_INSTRUCTION, COMPLETED_BANNER)
        } else if self.is_last_day {
            (LAST_DAY_INSTRUCTION, LAST_DAY_BANNER)
        } else {
            ("", "")
        }
    }
}

pub fn build(ctx: &ReportContext) -> String {
    let (instruction, banner) = ctx.alert();
    let lesson = serde_json::to_string(&ctx.lesson).unwrap_or_else(|_| "null".into());
    let news = serde_json::to_string(&ctx.news).unwrap_or_else(|_| "[]".into());

    let mut prompt = String::new();
    prompt.push_str("You are a Senior Staff Engineer mentoring a student.\n\n");
    prompt.push_str(&format!("CONTEXT: {instruction}\n"));
    prompt.push_str(&format!("TODAY'S LESSON: {lesson}\n"));
    prompt.push_str(&format!("INDUSTRY UPDATES: {news}\n\n"));
    prompt.push_str("TASK: Generate a clean, modern HTML Email.\n\n");
    prompt.push_str(GUIDELINES);
    prompt.push_str("\nHTML TEMPLATE TO FILL:\n");
    prompt.push_str(&TEMPLATE.replace("{{ALERT_BANNER}}", banner));
    prompt
}

const GUIDELINES: &str = "GUIDELINES:
1. **Tone:** Professional, encouraging, and concise.
2. **Structure:**
   - **Lesson Section:** Explain the concept clearly. Why does it matter for System Design?
   - **Pulse Section:** Pick the BEST news item. Give a 1-sentence summary.
   - **Concept Section:** Teach a System Design term (e.g., CAP Theorem, Sharding) with a \"Pro Tip\".

OUTPUT FORMAT:
Return ONLY valid HTML code. No markdown. Use the CSS classes provided in the style block below.
";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<style>
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; background-color: #f4f4f4; margin: 0; padding: 0; color: #333333; }
    .container { max-width: 600px; margin: 20px auto; background: #ffffff; border-radius: 12px; overflow: hidden; box-shadow: 0 4px 12px rgba(0,0,0,0.05); }
    .header { background: #1a1a1a; padding: 30px 20px; text-align: center; }
    .header h1 { color: #ffffff; margin: 0; font-size: 24px; font-weight: 700; letter-spacing: -0.5px; }
    .header p { color: #888888; margin: 5px 0 0 0; font-size: 14px; }
    .content { padding: 30px 25px; }
    .section-label { text-transform: uppercase; font-size: 11px; font-weight: 800; letter-spacing: 1px; color: #888; margin-bottom: 10px; display: block; }
    .card { border: 1px solid #eaeaea; border-radius: 8px; padding: 20px; margin-bottom: 30px; background: #fff; }
    .lesson-card { border-left: 5px solid #10b981; background: #f0fdf9; }
    .news-card { border-left: 5px solid #3b82f6; }
    .concept-card { border-left: 5px solid #f59e0b; background: #fffbeb; }
    h2 { margin-top: 0; font-size: 20px; color: #111; line-height: 1.3; }
    p { line-height: 1.6; color: #555; font-size: 15px; margin-bottom: 15px; }
    .btn { display: inline-block; background: #1a1a1a; color: #ffffff; text-decoration: none; padding: 10px 20px; border-radius: 6px; font-weight: 600; font-size: 14px; }
    .btn-link { color: #3b82f6; text-decoration: none; font-weight: 600; }
    .footer { background: #f9fafb; padding: 20px; text-align: center; font-size: 12px; color: #999; border-top: 1px solid #eaeaea; }
</style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>TOPIC MASTER 🚀</h1>
            <p>Your Daily Engineering Brief</p>
        </div>

        <div class="content">
            {{ALERT_BANNER}}

            <!-- SECTION 1: LESSON -->
            <span class="section-label">Today's Curriculum</span>
            <div class="card lesson-card">
                <h2>[Insert Lesson Title]</h2>
                <p><strong>Mentor's Note:</strong> [Insert Analysis Here]</p>
                <a href="[Insert Link]" class="btn">Watch Lesson &rarr;</a>
            </div>

            <!-- SECTION 2: PULSE -->
            <span class="section-label">Industry Pulse</span>
            <div class="card news-card">
                <h2>[Insert News Title]</h2>
                <p><strong>Source:</strong> [Source Name]</p>
                <p>[Insert Summary Here]</p>
                <a href="[Insert Link]" class="btn-link">Read Full Article</a>
            </div>

            <!-- SECTION 3: CONCEPT -->
            <span class="section-label">System Design Concept</span>
            <div class="card concept-card">
                <h2>💡 [Insert Concept Name]</h2>
                <p>[Insert Definition]</p>
                <p style="background: rgba(245, 158, 11, 0.1); padding: 10px; border-radius: 5px; color: #92400e; font-weight: 500;">
                    <strong>Pro Tip:</strong> [Insert Interview Tip]
                </p>
            </div>
        </div>

        <div class="footer">
            Automated by Topic Master<br>
            Keep building.
        </div>
    </div>
</body>
</html>
"#;
