use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use futures::StreamExt;
use sn_core::Category;
use sn_deck::{DeckController, SaveNotice, SwipeDirection, SwipeOutcome};
use std::io::Write;
use std::time::Duration;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const PEEK: usize = 3;

// Raw mode needs explicit carriage returns.
fn say(line: &str) {
    let mut out = std::io::stdout();
    let _ = write!(out, "{}\r\n", line);
    let _ = out.flush();
}

fn render(controller: &DeckController) {
    let window = controller.peek_window(PEEK);
    let Some((top, rest)) = window.split_first() else {
        say("📭 No more articles. Press r to refresh or q to quit.");
        return;
    };
    say("");
    say(&format!(
        "📰 [{}/{}] {}",
        controller.cursor() + 1,
        controller.deck().len(),
        top.title
    ));
    say(&format!("   {} | {}", top.source_name(), top.display_date()));
    if let Some(description) = top.description.as_deref() {
        say(&format!("   {}", description));
    }
    for next in rest {
        say(&format!("   next: {}", next.title));
    }
    say("   ← / d discard   → / a save   r refresh   q quit");
}

pub fn print_notice(notice: &SaveNotice) {
    match notice {
        SaveNotice::Saved { article, .. } => say(&format!("💾 Saved: {}", article.title)),
        SaveNotice::Failed { article, error, .. } => {
            say(&format!("⚠️ Could not save \"{}\": {}", article.title, error))
        }
        SaveNotice::Stale { article, .. } => {
            debug!("Save finished after reload: {}", article.title)
        }
    }
}

fn swipe(controller: &mut DeckController, direction: SwipeDirection) {
    match controller.swipe_top(direction) {
        SwipeOutcome::Accepted(article) => say(&format!("👍 {}", article.title)),
        SwipeOutcome::Discarded(article) => say(&format!("👎 {}", article.title)),
        SwipeOutcome::Ignored(reason) => debug!("Swipe ignored: {}", reason),
    }
    render(controller);
}

async fn event_loop(controller: &mut DeckController) -> anyhow::Result<()> {
    let mut reader = EventStream::new();
    render(controller);

    loop {
        while let Some(notice) = controller.try_next_notice() {
            print_notice(&notice);
        }

        let event = match tokio::time::timeout(POLL_INTERVAL, reader.next()).await {
            Ok(Some(event)) => event?,
            Ok(None) => break,
            Err(_) => continue,
        };
        let Event::Key(key) = event else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
            KeyCode::Right | KeyCode::Char('a') => swipe(controller, SwipeDirection::Accept),
            KeyCode::Left | KeyCode::Char('d') => swipe(controller, SwipeDirection::Discard),
            KeyCode::Char('r') => {
                match controller.query() {
                    Some(query) => say(&format!("🔄 Searching \"{}\" again...", query)),
                    None => say(&format!("🔄 Refreshing {}...", controller.category().label())),
                }
                match controller.reload().await {
                    Ok(_) => render(controller),
                    Err(e) => say(&format!("❌ Refresh failed: {}", e)),
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// What the first deck is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckSource {
    Category(Category),
    Query(String),
}

/// Runs an interactive deck until the user quits, then waits for
/// outstanding saves.
pub async fn run(mut controller: DeckController, source: DeckSource) -> anyhow::Result<()> {
    match &source {
        DeckSource::Category(category) => controller.refresh(*category).await?,
        DeckSource::Query(query) => controller.search(query).await?,
    };

    terminal::enable_raw_mode()?;
    let result = event_loop(&mut controller).await;
    terminal::disable_raw_mode()?;

    while let Some(notice) = controller.next_notice().await {
        print_notice(&notice);
    }
    result
}
