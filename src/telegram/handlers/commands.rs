//! Command handler implementations (/start, /help, /audio, /cancel, links, format taps)

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::types::{HandlerDeps, HandlerError};
use crate::core::error::AppError;
use crate::core::validation::{extract_first_url, validate_media_url};
use crate::delivery::{build_format_choices, FormatError, MediaKind};
use crate::download::fetcher::FetchRequest;
use crate::download::pipeline::{run_job, Job};
use crate::download::platform::Platform;
use crate::telegram::keyboards::{formats_keyboard, parse_format_callback};
use crate::telegram::messages;
use crate::telegram::sessions::Pick;
use crate::telegram::Bot;

/// Records the message in the rate limiter. Returns `false` (after telling
/// the user) when the chat is over its budget.
pub(super) async fn check_rate_limit(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<bool, HandlerError> {
    match deps.rate_limiter.check_and_record(msg.chat.id).await {
        Ok(()) => Ok(true),
        Err(wait) => {
            log::info!("Rate limited chat {} for {:?}", msg.chat.id, wait);
            bot.send_message(msg.chat.id, messages::rate_limited(wait.as_secs()))
                .await?;
            Ok(false)
        }
    }
}

/// Handle /start and /help
pub(super) async fn handle_help_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, messages::help_text(deps.size_policy()))
        .await?;
    Ok(())
}

/// Handle /audio <link>
pub(super) async fn handle_audio_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    arg: &str,
) -> Result<(), HandlerError> {
    let link = arg.trim();
    if link.is_empty() {
        bot.send_message(msg.chat.id, messages::AUDIO_USAGE).await?;
        return Ok(());
    }
    let request = match validate_link(msg.chat.id, link) {
        Ok(url) => FetchRequest::new(url, MediaKind::Audio),
        Err(refusal) => {
            bot.send_message(msg.chat.id, refusal).await?;
            return Ok(());
        }
    };
    if let Err(refusal) = start_job(deps, msg.chat.id, request) {
        bot.send_message(msg.chat.id, refusal).await?;
    }
    Ok(())
}

/// Handle /cancel
pub(super) async fn handle_cancel_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let text = if deps.jobs.cancel(msg.chat.id) {
        messages::CANCEL_REQUESTED
    } else {
        messages::NOTHING_TO_CANCEL
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Handle a plain text message: the first link in it opens the format menu.
pub(super) async fn handle_link_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    match extract_first_url(text) {
        Some(link) => offer_formats(bot, msg.chat.id, deps, link).await,
        // Unknown commands are not answered
        None if text.starts_with('/') => Ok(()),
        None => {
            bot.send_message(msg.chat.id, messages::NO_LINK).await?;
            Ok(())
        }
    }
}

/// Looks up the link's formats and replies with the quality keyboard.
///
/// Sites without a per-quality list are downloaded at the best quality
/// straight away.
async fn offer_formats(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, link: &str) -> Result<(), HandlerError> {
    let url = match validate_link(chat_id, link) {
        Ok(url) => url,
        Err(refusal) => {
            bot.send_message(chat_id, refusal).await?;
            return Ok(());
        }
    };
    let platform = Platform::detect(&url);
    let status = bot.send_message(chat_id, messages::LOOKING_UP).await?;

    let lookup = deps
        .job_context
        .fetcher
        .list_formats(&url, platform, &CancellationToken::new())
        .await;
    let info = match lookup {
        Ok(info) => info,
        Err(e) => {
            log::warn!("Format lookup failed for chat {} [{}]: {}", chat_id, e.category(), e);
            bot.edit_message_text(chat_id, status.id, platform.lookup_failed_message())
                .await?;
            return Ok(());
        }
    };

    let choices = match build_format_choices(&info.formats, deps.size_policy()) {
        Ok(choices) => choices,
        Err(FormatError::NoUsableFormats) => {
            log::info!("No format list for {} ({} entries), using the default selector", url, info.formats.len());
            let text = match start_job(deps, chat_id, FetchRequest::new(url, MediaKind::Video)) {
                Ok(()) => messages::NO_FORMAT_LIST.to_string(),
                Err(refusal) => refusal,
            };
            bot.edit_message_text(chat_id, status.id, text).await?;
            return Ok(());
        }
    };

    log::info!("Offering {} formats for {} to chat {}", choices.len(), url, chat_id);
    let text = messages::format_menu(info.title.as_deref(), &choices, deps.size_policy());
    let version = deps.sessions.open(chat_id, url, platform, choices.clone());
    bot.edit_message_text(chat_id, status.id, text)
        .reply_markup(formats_keyboard(&choices, version))
        .await?;
    Ok(())
}

/// Handle a tap on the format keyboard.
pub(super) async fn handle_format_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let parsed = q.data.as_deref().and_then(parse_format_callback);
    let (Some((version, choice_id)), Some(message)) = (parsed, q.message.as_ref()) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let chat_id = message.chat().id;

    if let Err(wait) = deps.rate_limiter.check_and_record(chat_id).await {
        bot.answer_callback_query(q.id.clone())
            .text(messages::rate_limited(wait.as_secs()))
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let picked = match deps.sessions.pick(chat_id, version, choice_id) {
        Ok(picked) => picked,
        Err(e) => {
            log::info!("Refused format tap {:?} from chat {}: {}", choice_id, chat_id, e);
            bot.answer_callback_query(q.id.clone())
                .text(e.user_message())
                .show_alert(true)
                .await?;
            return Ok(());
        }
    };
    bot.answer_callback_query(q.id.clone()).await?;

    let (request, label) = match &picked.pick {
        Pick::Video(choice) => (
            FetchRequest::new(picked.url.clone(), MediaKind::Video).with_format(choice.into()),
            choice.label(),
        ),
        Pick::Audio => (
            FetchRequest::new(picked.url.clone(), MediaKind::Audio),
            messages::AUDIO_ONLY_LABEL.to_string(),
        ),
    };
    log::info!("Chat {} picked {} for {} ({})", chat_id, label, picked.url, picked.platform);

    let text = match start_job(deps, chat_id, request) {
        Ok(()) => messages::format_chosen(&label),
        Err(refusal) => refusal,
    };
    bot.edit_message_text(chat_id, message.id(), text).await?;
    Ok(())
}

fn validate_link(chat_id: ChatId, link: &str) -> Result<Url, String> {
    validate_media_url(link).map_err(|e| {
        log::info!("Refused link from chat {}: {}", chat_id, e);
        AppError::Validation(e.to_string()).user_message()
    })
}

/// Registers the job and spawns the pipeline.
///
/// # Returns
/// * `Ok(())` - job accepted; the pipeline reports progress itself
/// * `Err(String)` - text explaining why the request was refused
pub(crate) fn start_job(deps: &HandlerDeps, chat_id: ChatId, request: FetchRequest) -> Result<(), String> {
    let handle = deps.jobs.try_start(chat_id).map_err(|e| {
        log::info!("Refused job for chat {}: {}", chat_id, e);
        e.user_message()
    })?;

    let ctx = deps.job_context.clone();
    let job = Job { handle, request };
    tokio::spawn(async move {
        run_job(&ctx, job).await;
    });

    Ok(())
}
