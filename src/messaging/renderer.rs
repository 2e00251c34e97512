//! Terminal renderer for UI events.

use std::io::{stdout, Write};

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};

use super::{BusError, EventReceiver, Level, TurnEnd, UiEvent};

/// Render style configuration.
#[derive(Debug, Clone)]
pub struct RenderStyle {
    pub info_color: Color,
    pub success_color: Color,
    pub warning_color: Color,
    pub error_color: Color,
    pub dim_color: Color,
    pub accent_color: Color,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            info_color: Color::White,
            success_color: Color::Green,
            warning_color: Color::Yellow,
            error_color: Color::Red,
            dim_color: Color::DarkGrey,
            accent_color: Color::Cyan,
        }
    }
}

/// Draws events to a terminal (or any writer, for tests).
pub struct TerminalRenderer {
    style: RenderStyle,
    /// Whether the cursor is in the middle of streamed text.
    mid_line: bool,
    show_thoughts: bool,
    last_progress: Option<u8>,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self {
            style: RenderStyle::default(),
            mid_line: false,
            show_thoughts: true,
            last_progress: None,
        }
    }

    pub fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }

    pub fn show_thoughts(mut self, show: bool) -> Self {
        self.show_thoughts = show;
        self
    }

    /// Consume events until the bus closes.
    pub async fn run_loop(mut self, mut receiver: EventReceiver) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let mut out = stdout();
                    if let Err(e) = self.render(&mut out, &event).and_then(|_| out.flush()) {
                        tracing::debug!(error = %e, "Terminal write failed");
                    }
                }
                Err(BusError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Renderer fell behind");
                }
                Err(BusError::Closed) => break,
            }
        }
    }

    fn break_line<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        if self.mid_line {
            queue!(out, Print("\n"))?;
            self.mid_line = false;
        }
        Ok(())
    }

    fn colored<W: Write>(&self, out: &mut W, color: Color, text: &str) -> std::io::Result<()> {
        queue!(out, SetForegroundColor(color), Print(text), ResetColor)
    }

    /// Render one event.
    pub fn render<W: Write>(&mut self, out: &mut W, event: &UiEvent) -> std::io::Result<()> {
        match event {
            UiEvent::Notice(notice) => {
                self.break_line(out)?;
                let (color, prefix) = match notice.level {
                    Level::Info => (self.style.info_color, ""),
                    Level::Success => (self.style.success_color, "✓ "),
                    Level::Warning => (self.style.warning_color, "⚠ "),
                    Level::Error => (self.style.error_color, "✗ "),
                };
                self.colored(out, color, &format!("{}{}\n", prefix, notice.text))
            }
            UiEvent::UserMessage { content, .. } => {
                self.break_line(out)?;
                queue!(
                    out,
                    SetAttribute(Attribute::Bold),
                    Print("you › "),
                    SetAttribute(Attribute::Reset),
                    Print(content),
                    Print("\n")
                )
            }
            UiEvent::TurnStarted { .. } => {
                self.last_progress = None;
                self.colored(out, self.style.dim_color, "researching…\n")
            }
            UiEvent::TextDelta { text } => {
                self.mid_line = !text.ends_with('\n');
                queue!(out, Print(text))
            }
            UiEvent::Progress { percent, detail } => {
                if self.last_progress == Some(*percent) && detail.is_empty() {
                    return Ok(());
                }
                self.last_progress = Some(*percent);
                self.break_line(out)?;
                let line = if detail.is_empty() {
                    format!("[{:>3}%]\n", percent)
                } else {
                    format!("[{:>3}%] {}\n", percent, detail)
                };
                self.colored(out, self.style.dim_color, &line)
            }
            UiEvent::Citation { citation } => {
                self.break_line(out)?;
                self.colored(
                    out,
                    self.style.accent_color,
                    &format!("  ↳ source: {} <{}>\n", citation.name, citation.url),
                )
            }
            UiEvent::Thought { step } => {
                if !self.show_thoughts {
                    return Ok(());
                }
                self.break_line(out)?;
                self.colored(
                    out,
                    self.style.dim_color,
                    &format!("  💭 [{}] {}\n", step.step_type, step.content),
                )
            }
            UiEvent::ToolCall { call } => {
                self.break_line(out)?;
                self.colored(out, self.style.dim_color, &format!("  🔧 {}\n", call.name))
            }
            UiEvent::FeedbackRequested { options, prompt } => {
                self.break_line(out)?;
                let question = prompt.as_deref().unwrap_or("The research agent is waiting for your approval");
                self.colored(
                    out,
                    self.style.warning_color,
                    &format!("⏸ {} [{}]\n", question, options.join(" / ")),
                )
            }
            UiEvent::FeedbackSent { choice } => {
                self.colored(out, self.style.dim_color, &format!("→ sent '{}'\n", choice))
            }
            UiEvent::TurnEnded { end, .. } => {
                self.break_line(out)?;
                match end {
                    TurnEnd::Completed { citations } => {
                        if !citations.is_empty() {
                            queue!(out, SetAttribute(Attribute::Bold), Print("\nSources\n"), SetAttribute(Attribute::Reset))?;
                            for (i, c) in citations.iter().enumerate() {
                                queue!(out, Print(format!("  {}. {} — {}\n", i + 1, c.name, c.url)))?;
                            }
                        }
                        Ok(())
                    }
                    TurnEnd::Failed {
                        message,
                        fallback,
                        recoverable,
                        retry_after,
                    } => {
                        self.colored(out, self.style.error_color, &format!("✗ {}\n", message))?;
                        queue!(out, Print(fallback), Print("\n"))?;
                        if *recoverable {
                            let hint = match retry_after {
                                Some(secs) => format!("Retry in {}s with the same command.\n", secs),
                                None => "Run the same command again to retry.\n".to_string(),
                            };
                            self.colored(out, self.style.dim_color, &hint)?;
                        }
                        Ok(())
                    }
                    TurnEnd::Interrupted => self.colored(out, self.style.warning_color, "⏹ interrupted\n"),
                }
            }
        }
    }
}
