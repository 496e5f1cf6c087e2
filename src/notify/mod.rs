//! Outbound notifications
//!
//! Sending is best effort: every method reports success as a `bool` and
//! failures are logged, never propagated. A missing bot token degrades to
//! "notification skipped".

mod reporter;
mod telegram;

pub use reporter::{
    CooldownCache, ErrorKind, ErrorReport, ErrorReporter, FileCache, MemoryCache, Severity,
};
pub use telegram::TelegramNotifier;

use crate::game::GameSchema;
use crate::predict::PredictionCandidate;

/// Candidates shown in one prediction message
pub const MESSAGE_CANDIDATES: usize = 5;

const RULE: &str = "━━━━━━━━━━━━━━━";

#[allow(async_fn_in_trait)]
pub trait Notifier {
    /// Send `text` (HTML) to every configured target.
    async fn send_message(&self, text: &str) -> bool;

    /// Send an operator alert. Defaults to [`Notifier::send_message`].
    async fn send_alert(&self, text: &str) -> bool {
        self.send_message(text).await
    }

    async fn send_prediction(
        &self,
        schema: &GameSchema,
        candidates: &[PredictionCandidate],
    ) -> bool {
        if candidates.is_empty() {
            return false;
        }
        self.send_message(&format_prediction(schema, candidates)).await
    }
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn group_icon(index: usize, positional: bool) -> &'static str {
    match (positional, index) {
        (true, _) => "🔢",
        (false, 0) => "🔴",
        _ => "🔵",
    }
}

/// HTML message listing the first [`MESSAGE_CANDIDATES`] candidates.
pub fn format_prediction(schema: &GameSchema, candidates: &[PredictionCandidate]) -> String {
    let mut message = format!("🔮 <b>{}预测</b>\n\n", schema.name);

    for (i, candidate) in candidates.iter().take(MESSAGE_CANDIDATES).enumerate() {
        message.push_str(&format!(
            "<b>组合 {}:</b> <i>[{}]</i>\n",
            i + 1,
            candidate.strategy_name
        ));
        for (index, (group, values)) in schema
            .groups
            .iter()
            .zip(candidate.numbers.groups())
            .enumerate()
        {
            let rendered = values
                .iter()
                .map(|v| {
                    if group.positional {
                        v.to_string()
                    } else {
                        format!("{v:02}")
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            message.push_str(&format!(
                "{} {}: <code>{}</code>\n",
                group_icon(index, group.positional),
                group.label,
                rendered
            ));
        }
        message.push('\n');
    }

    message.push_str(RULE);
    message.push_str("\n⚠️ 仅供参考，理性购彩");
    message
}

#[cfg(test)]
mod tests {
    use chrono::Local;

    use super::*;
    use crate::draw::Combination;
    use crate::game::GameId;
    use crate::predict::StrategyKind;

    fn candidate(rank: usize, groups: Vec<Vec<u8>>) -> PredictionCandidate {
        PredictionCandidate {
            rank,
            numbers: Combination::new(groups),
            strategy: StrategyKind::Frequency,
            strategy_name: "频率策略",
            generated_at: Local::now(),
        }
    }

    #[test]
    fn test_prediction_message_layout() {
        let schema = GameId::Dlt.schema();
        let message = format_prediction(
            &schema,
            &[candidate(1, vec![vec![1, 5, 9, 20, 35], vec![2, 12]])],
        );
        assert!(message.starts_with("🔮 <b>大乐透预测</b>"));
        assert!(message.contains("<b>组合 1:</b> <i>[频率策略]</i>"));
        assert!(message.contains("🔴 前区: <code>01 05 09 20 35</code>"));
        assert!(message.contains("🔵 后区: <code>02 12</code>"));
    }

    #[test]
    fn test_prediction_message_caps_candidates() {
        let schema = GameId::Qxc.schema();
        let candidates: Vec<_> = (1..=8)
            .map(|i| candidate(i, vec![vec![i as u8, 1, 2, 3, 4, 5, 6]]))
            .collect();
        let message = format_prediction(&schema, &candidates);
        assert!(message.contains("<b>组合 5:</b>"));
        assert!(!message.contains("<b>组合 6:</b>"));
        assert!(message.contains("🔢 号码: <code>1 1 2 3 4 5 6</code>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }

    #[derive(Default)]
    struct CountingNotifier {
        sent: std::cell::Cell<usize>,
    }

    impl Notifier for CountingNotifier {
        async fn send_message(&self, _text: &str) -> bool {
            self.sent.set(self.sent.get() + 1);
            true
        }
    }

    #[tokio::test]
    async fn test_empty_prediction_is_not_sent() {
        let schema = GameId::Ssq.schema();
        let notifier = CountingNotifier::default();
        assert!(!notifier.send_prediction(&schema, &[]).await);
        assert_eq!(notifier.sent.get(), 0);

        let one = candidate(1, vec![vec![1, 2, 3, 4, 5, 6], vec![7]]);
        assert!(notifier.send_prediction(&schema, &[one]).await);
        assert_eq!(notifier.sent.get(), 1);
    }
}
