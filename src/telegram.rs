use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    utils::html,
};

use crate::quiz::letter;
use crate::quiz::session::{DeliveryError, QuestionCard, Transport};

/// Delivers engine output over the Telegram bot API.
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn present_question(&self, chat: ChatId, card: &QuestionCard) -> Result<(), DeliveryError> {
        self.bot
            .send_message(chat, render_card(card))
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .reply_markup(answer_keyboard(card.options.len(), card.qid))
            .await?;
        Ok(())
    }

    async fn notify(&self, chat: ChatId, text: &str) -> Result<(), DeliveryError> {
        self.bot.send_message(chat, text).await?;
        Ok(())
    }
}

/// HTML body of one question message: header, bold prompt, lettered options.
/// Options live in the text so long answers are never truncated by button
/// width; the buttons carry only the letters.
fn render_card(card: &QuestionCard) -> String {
    let options = card
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {}", letter(i), html::escape(option)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "🧩 <b>{}</b>\nПитання {}/{}  ⏱ {}с\n\n<b>{}</b>\n\n{}",
        html::escape(&card.title),
        card.number,
        card.total,
        card.timeout.as_secs(),
        html::escape(&card.prompt),
        options,
    )
}

/// Letter buttons in rows of at most six, then the quit row.
fn answer_keyboard(options: usize, qid: u64) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = (0..options)
        .map(|i| InlineKeyboardButton::callback(letter(i).to_string(), format!("ans|{qid}|{i}")))
        .collect();
    let mut rows: Vec<Vec<InlineKeyboardButton>> =
        buttons.chunks(6).map(|row| row.to_vec()).collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "⛔ Завершити тест",
        "quit",
    )]);
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use teloxide::types::InlineKeyboardButtonKind;

    fn card() -> QuestionCard {
        QuestionCard {
            title: "2 блок — Законодавство — повний".into(),
            number: 2,
            total: 5,
            prompt: "Що таке <МКУ>?".into(),
            options: vec!["Кодекс".into(), "Закон & указ".into()],
            qid: 4,
            timeout: Duration::from_secs(60),
        }
    }

    fn callback_data(button: &InlineKeyboardButton) -> &str {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => data,
            other => panic!("unexpected button kind: {other:?}"),
        }
    }

    #[test]
    fn card_renders_header_prompt_and_lettered_options() {
        let text = render_card(&card());
        assert!(text.starts_with("🧩 <b>2 блок — Законодавство — повний</b>\nПитання 2/5  ⏱ 60с"));
        assert!(text.contains("<b>Що таке &lt;МКУ&gt;?</b>"));
        assert!(text.contains("A. Кодекс"));
        assert!(text.contains("B. Закон &amp; указ"));
    }

    #[test]
    fn keyboard_breaks_letters_into_rows_of_six_plus_quit() {
        let markup = answer_keyboard(8, 3);
        let rows = &markup.inline_keyboard;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 6);
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[2].len(), 1);

        assert_eq!(rows[0][0].text, "A");
        assert_eq!(callback_data(&rows[0][0]), "ans|3|0");
        assert_eq!(callback_data(&rows[1][1]), "ans|3|7");
        assert_eq!(callback_data(&rows[2][0]), "quit");
    }
}
