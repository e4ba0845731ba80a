mod quiz;
mod telegram;

use std::path::Path;
use std::sync::Arc;

use dotenv::dotenv;
use rand::seq::SliceRandom;
use rand::thread_rng;
use teloxide::{
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, UserId},
    utils::command::BotCommands,
};

use quiz::blocks::{self, Blocks};
use quiz::select::{self, Mode, SelectError};
use quiz::session::{QuizEngine, ResolveOutcome};
use quiz::{Question, QuizConfig};
use telegram::TelegramTransport;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const NO_QUESTIONS_TEXT: &str = "Немає питань у цьому блоці.";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
}

#[tokio::main]
async fn main() {
    // .env is optional; the token may come from the real environment
    let _ = dotenv();
    pretty_env_logger::init();
    log::info!("Starting quiz bot...");

    let token = std::env::var("BOT_TOKEN").expect("BOT_TOKEN is not set");
    let bot = Bot::new(token);

    let data_dir = std::env::var("QUIZ_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let blocks = Blocks::load(Path::new(&data_dir))
        .unwrap_or_else(|err| panic!("Failed to load question banks: {err}"));
    log::info!("Loaded {} question bank(s) from '{data_dir}'", blocks.file_count());
    let blocks = Arc::new(blocks);

    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let engine = QuizEngine::new(transport, QuizConfig::default());

    Dispatcher::builder(
        bot,
        dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(cmd_start),
            )
            .branch(Update::filter_callback_query().endpoint(on_callback)),
    )
    .dependencies(dptree::deps![engine, blocks])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

async fn cmd_start(bot: Bot, engine: Arc<QuizEngine>, msg: Message) -> HandlerResult {
    // opening the menu silently drops any running quiz
    if let Some(user) = msg.from() {
        engine.stop(user.id).await;
    }
    show_main_menu(&bot, msg.chat.id, engine.config().final_size).await
}

/// The callback tokens carried by inline buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Callback {
    Menu(String),
    Submenu(String),
    StartBlock { key: String, mode: Mode },
    StartFile { file: String, mode: Mode },
    GlobalFinal,
    Back,
    Noop,
    Quit,
    Answer { qid: u64, index: usize },
}

impl Callback {
    fn parse(data: &str) -> Option<Self> {
        match data {
            "noop" => return Some(Self::Noop),
            "back" => return Some(Self::Back),
            "quit" => return Some(Self::Quit),
            "global_final" => return Some(Self::GlobalFinal),
            _ => {}
        }
        if let Some(key) = data.strip_prefix("menu|") {
            return Some(Self::Menu(key.to_string()));
        }
        if let Some(file) = data.strip_prefix("submenu|") {
            return Some(Self::Submenu(file.to_string()));
        }
        if let Some(rest) = data.strip_prefix("start|") {
            let (key, mode) = rest.rsplit_once('|')?;
            return Some(Self::StartBlock {
                key: key.to_string(),
                mode: Mode::parse(mode)?,
            });
        }
        if let Some(rest) = data.strip_prefix("startfile|") {
            let (file, mode) = rest.rsplit_once('|')?;
            return Some(Self::StartFile {
                file: file.to_string(),
                mode: Mode::parse(mode)?,
            });
        }
        if let Some(rest) = data.strip_prefix("ans|") {
            let (qid, index) = rest.split_once('|')?;
            return Some(Self::Answer {
                qid: qid.parse().ok()?,
                index: index.parse().ok()?,
            });
        }
        None
    }
}

async fn on_callback(
    bot: Bot,
    engine: Arc<QuizEngine>,
    blocks: Arc<Blocks>,
    query: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(query.id.clone()).await?;
    let Some(chat) = query.message.as_ref().map(|m| m.chat.id) else {
        return Ok(());
    };
    let user = query.from.id;
    let final_size = engine.config().final_size;

    match query.data.as_deref().and_then(Callback::parse) {
        Some(Callback::Noop) => {}
        Some(Callback::Back) => {
            engine.stop(user).await;
            show_main_menu(&bot, chat, final_size).await?;
        }
        Some(Callback::Menu(key)) => {
            engine.stop(user).await;
            show_block_menu(&bot, chat, &blocks, &key, final_size).await?;
        }
        Some(Callback::Submenu(file)) => {
            engine.stop(user).await;
            show_subblock_menu(&bot, chat, &blocks, &file, final_size).await?;
        }
        Some(Callback::Quit) => {
            engine.stop(user).await;
            bot.send_message(chat, "⛔ Тест зупинено.").await?;
            show_main_menu(&bot, chat, final_size).await?;
        }
        Some(Callback::GlobalFinal) => {
            // final_size questions from each main block, shuffled together
            let mut pool = Vec::new();
            for block in &blocks::MAIN_BLOCKS {
                if let Ok(mut picked) =
                    select::select(&blocks.merge(block.files), Mode::Final, final_size)
                {
                    pool.append(&mut picked);
                }
            }
            if pool.is_empty() {
                bot.send_message(chat, NO_QUESTIONS_TEXT).await?;
                return Ok(());
            }
            pool.shuffle(&mut thread_rng());
            let title = format!("🎓 Загальний фінальний тест ({final_size} з кожного блоку)");
            launch(&bot, &engine, user, chat, title, pool, "Починаємо фінальний тест…").await?;
        }
        Some(Callback::StartBlock { key, mode }) => {
            let pool = blocks::main_block(&key)
                .map(|block| blocks.merge(block.files))
                .unwrap_or_default();
            match select::select(&pool, mode, final_size) {
                Ok(questions) => {
                    let label: &str = match blocks::main_block(&key) {
                        Some(block) => block.title,
                        None => &key,
                    };
                    let title = quiz_title(label, mode, final_size);
                    launch(&bot, &engine, user, chat, title, questions, "Починаємо тест…").await?;
                }
                Err(SelectError::EmptyPool) => {
                    bot.send_message(chat, NO_QUESTIONS_TEXT).await?;
                }
            }
        }
        Some(Callback::StartFile { file, mode }) => {
            let Some(block) = blocks.get(&file) else {
                bot.send_message(chat, "Не знайшов підблок.").await?;
                return Ok(());
            };
            match select::select(&block.questions, mode, final_size) {
                Ok(questions) => {
                    let label = blocks::subblock_label(&file).unwrap_or(&block.title);
                    let title = quiz_title(label, mode, final_size);
                    launch(&bot, &engine, user, chat, title, questions, "Починаємо тест…").await?;
                }
                Err(SelectError::EmptyPool) => {
                    bot.send_message(chat, NO_QUESTIONS_TEXT).await?;
                }
            }
        }
        Some(Callback::Answer { qid, index }) => {
            match engine.resolve(user, qid, Some(index)).await {
                ResolveOutcome::Applied => {}
                ResolveOutcome::Stale => {
                    bot.send_message(chat, "Це питання вже не активне.").await?;
                }
                ResolveOutcome::NoSession => {
                    bot.send_message(chat, "Сесія не активна. /start").await?;
                }
            }
        }
        None => {
            bot.send_message(chat, "Невідома команда. /start").await?;
        }
    }
    Ok(())
}

fn quiz_title(label: &str, mode: Mode, final_size: usize) -> String {
    match mode {
        Mode::Full => format!("{label} — повний"),
        Mode::Final => format!("{label} — фінальний ({final_size})"),
    }
}

async fn launch(
    bot: &Bot,
    engine: &Arc<QuizEngine>,
    user: UserId,
    chat: ChatId,
    title: String,
    questions: Vec<Question>,
    opening: &str,
) -> HandlerResult {
    bot.send_message(chat, opening).await?;
    if let Err(err) = engine.start(user, chat, title, questions).await {
        log::warn!("refused to start quiz: {err}");
        bot.send_message(chat, NO_QUESTIONS_TEXT).await?;
    }
    Ok(())
}

async fn show_main_menu(bot: &Bot, chat: ChatId, final_size: usize) -> HandlerResult {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = blocks::MAIN_BLOCKS
        .iter()
        .map(|b| vec![InlineKeyboardButton::callback(b.title, format!("menu|{}", b.key))])
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        format!("🎓 Загальний фінальний тест ({final_size} з кожного блоку)"),
        "global_final",
    )]);
    bot.send_message(chat, "Обери блок:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

async fn show_block_menu(
    bot: &Bot,
    chat: ChatId,
    blocks: &Blocks,
    key: &str,
    final_size: usize,
) -> HandlerResult {
    let Some(block) = blocks::main_block(key) else {
        return show_main_menu(bot, chat, final_size).await;
    };

    // block 2 gets its sub-block submenu on top of the two modes
    if block.key == "b2" {
        let mut rows = vec![
            vec![InlineKeyboardButton::callback(
                "▶ Повний тест Блоку 2 (усі питання)",
                "start|b2|full",
            )],
            vec![InlineKeyboardButton::callback(
                format!("🎯 Фінальний тест Блоку 2 ({final_size} випадкових)"),
                "start|b2|final",
            )],
            vec![InlineKeyboardButton::callback("— Підблоки —", "noop")],
        ];
        for file in block.files {
            let label = blocks::subblock_label(file)
                .map(str::to_string)
                .or_else(|| blocks.get(file).map(|b| b.title.clone()))
                .unwrap_or_else(|| (*file).to_string());
            rows.push(vec![InlineKeyboardButton::callback(
                label,
                format!("submenu|{file}"),
            )]);
        }
        rows.push(vec![InlineKeyboardButton::callback("⬅ Назад", "back")]);
        bot.send_message(chat, "Блок 2 — Законодавство. Обери режим або підблок:")
            .reply_markup(InlineKeyboardMarkup::new(rows))
            .await?;
        return Ok(());
    }

    let rows = vec![
        vec![InlineKeyboardButton::callback(
            "▶ Повний тест (усі питання)",
            format!("start|{key}|full"),
        )],
        vec![InlineKeyboardButton::callback(
            format!("🎯 Фінальний тест ({final_size} випадкових)"),
            format!("start|{key}|final"),
        )],
        vec![InlineKeyboardButton::callback("⬅ Назад", "back")],
    ];
    bot.send_message(chat, format!("{}. Обери режим:", block.title))
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

async fn show_subblock_menu(
    bot: &Bot,
    chat: ChatId,
    blocks: &Blocks,
    file: &str,
    final_size: usize,
) -> HandlerResult {
    let Some(block) = blocks.get(file) else {
        bot.send_message(chat, "Не знайшов файл підблоку.").await?;
        return Ok(());
    };
    let label = blocks::subblock_label(file).unwrap_or(&block.title);

    let rows = vec![
        vec![InlineKeyboardButton::callback(
            "▶ Повний тест підблоку",
            format!("startfile|{file}|full"),
        )],
        vec![InlineKeyboardButton::callback(
            format!("🎯 Фінальний тест підблоку ({final_size})"),
            format!("startfile|{file}|final"),
        )],
        vec![InlineKeyboardButton::callback(
            "⬅ Назад до Блоку 2",
            "menu|b2",
        )],
    ];
    bot.send_message(chat, format!("{label}. Обери режим:"))
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}
