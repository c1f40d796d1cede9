//! Inline Search Handler Module
//!
//! Answers inline queries with cached documents from the file index.
//! Every query walks the same path: access gate, subscription gate,
//! query parsing, search, formatting, and exactly one `answerInlineQuery`.

use std::sync::Arc;

use dashmap::DashSet;
use reqwest::Url;
use teloxide::{
    ApiError, Bot, RequestError,
    prelude::*,
    types::{
        FileId, InlineKeyboardButton, InlineKeyboardMarkup, InlineQuery, InlineQueryResult,
        InlineQueryResultCachedDocument, InlineQueryResultsButton, InlineQueryResultsButtonKind,
        UserId,
    },
};
use tracing::{debug, error, info, warn};

use crate::{
    Error,
    format::{CaptionFields, format_size, render_caption},
    index::{FileIndex, FileRecord, SearchRequest, SearchResultPage},
    subscription::SubscriptionCheck,
    system::InlineSettings,
};

/// Users barred from inline search; shared with the moderation commands
pub type BannedUsers = Arc<DashSet<u64>>;

/// Telegram refuses more than 50 results per answer
const MAX_RESULTS_LIMIT: usize = 50;

/// Raw inline query text split into a search term and an optional type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    /// Lowercased text after the first `|`, `None` when there is no `|`
    pub file_type: Option<String>,
}

impl SearchQuery {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('|') {
            Some((term, file_type)) => Self {
                term: term.trim().to_string(),
                file_type: Some(file_type.trim().to_lowercase()),
            },
            None => Self {
                term: raw.trim().to_string(),
                file_type: None,
            },
        }
    }
}

/// Parses the client-supplied pagination token, falling back to `0`.
pub fn parse_offset(token: &str) -> usize {
    let token = token.trim();
    if token.is_empty() {
        return 0;
    }
    token.parse().unwrap_or_else(|e| {
        warn!("Ignoring malformed inline offset {:?}: {}", token, e);
        0
    })
}

/// One formatted search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayResult {
    pub id: String,
    pub file_id: String,
    pub title: String,
    pub description: String,
    pub caption: String,
}

/// Everything needed for a single `answerInlineQuery` call
#[derive(Debug, Clone)]
pub struct InlineAnswer {
    pub results: Vec<DisplayResult>,
    /// Keyboard attached to every result
    pub reply_markup: Option<InlineKeyboardMarkup>,
    pub is_personal: bool,
    pub cache_time: u32,
    /// Switch-to-private-chat prompt shown above the results
    pub button_text: String,
    pub button_param: String,
    pub next_offset: Option<String>,
}

/// Errors from delivering an [`InlineAnswer`]
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("inline query expired before it was answered")]
    QueryExpired,
    #[error("Telegram API error: {0}")]
    Telegram(RequestError),
}

impl From<RequestError> for AnswerError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Api(ApiError::InvalidQueryId) => Self::QueryExpired,
            other => Self::Telegram(other),
        }
    }
}

/// Request-independent state of the inline search
pub struct InlineSearch {
    settings: InlineSettings,
    channel_url: Url,
    banned: BannedUsers,
    index: Arc<dyn FileIndex>,
    subscription: Option<Arc<dyn SubscriptionCheck>>,
}

impl InlineSearch {
    /// Builds the search context
    ///
    /// # Arguments
    /// * `settings` - Inline section of the configuration
    /// * `banned` - Shared banned-user set
    /// * `index` - File index to search
    /// * `subscription` - Channel check, present when a channel is required
    ///
    /// # Returns
    /// * `Result<Self, Error>` - Fails when `channel_url` is not a valid URL
    pub fn new(
        mut settings: InlineSettings,
        banned: BannedUsers,
        index: Arc<dyn FileIndex>,
        subscription: Option<Arc<dyn SubscriptionCheck>>,
    ) -> Result<Self, Error> {
        let channel_url = Url::parse(&settings.channel_url)?;
        settings.max_results = settings.max_results.clamp(1, MAX_RESULTS_LIMIT);

        Ok(Self {
            settings,
            channel_url,
            banned,
            index,
            subscription,
        })
    }

    /// Button linking to the configured channel
    pub fn channel_button(&self) -> InlineKeyboardButton {
        InlineKeyboardButton::url(
            self.settings.channel_button_text.clone(),
            self.channel_url.clone(),
        )
    }

    fn is_admitted(&self, user_id: UserId) -> bool {
        if !self.settings.auth_users.is_empty() {
            return self.settings.auth_users.contains(&user_id.0);
        }
        !self.banned.contains(&user_id.0)
    }

    /// Cache duration for found and not-found answers
    fn cache_time(&self) -> u32 {
        let gated = !self.settings.auth_users.is_empty() || self.settings.auth_channel.is_some();
        if self.settings.force_fresh_cache || gated {
            0
        } else {
            self.settings.cache_time
        }
    }

    fn reply_markup(&self, term: &str) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(vec![
            vec![self.channel_button()],
            vec![InlineKeyboardButton::switch_inline_query_current_chat(
                "🔍 Search again",
                term,
            )],
        ])
    }

    fn denied(text: &str, param: &str) -> InlineAnswer {
        InlineAnswer {
            results: Vec::new(),
            reply_markup: None,
            is_personal: false,
            cache_time: 0,
            button_text: text.to_string(),
            button_param: param.to_string(),
            next_offset: None,
        }
    }

    fn display(&self, file: &FileRecord, offset: usize, index: usize) -> DisplayResult {
        let size = file.file_size.map(format_size);
        let mut caption = file.caption.clone();

        if let Some(template) = &self.settings.custom_file_caption {
            let fields = CaptionFields {
                file_name: &file.file_name,
                file_size: size.as_deref().unwrap_or_default(),
                file_caption: file.caption.as_deref().unwrap_or_default(),
            };
            match render_caption(template, &fields) {
                Ok(rendered) => caption = Some(rendered),
                Err(e) => error!("Caption template failed for {}: {}", file.file_id, e),
            }
        }

        DisplayResult {
            id: format!("{offset}-{index}"),
            file_id: file.file_id.clone(),
            title: file.file_name.clone(),
            description: format!(
                "Size: {}\nType: {}",
                size.as_deref().unwrap_or("Unknown"),
                file.file_type
            ),
            caption: caption
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| file.file_name.clone()),
        }
    }

    /// Runs the gates and the search and decides how to answer.
    ///
    /// Index failures are logged and answered as "no results".
    pub async fn prepare(&self, user_id: UserId, raw_query: &str, offset_token: &str) -> InlineAnswer {
        if !self.is_admitted(user_id) {
            debug!("Inline access denied for user {}", user_id);
            return Self::denied(
                &self.settings.access_denied_text,
                &self.settings.access_denied_param,
            );
        }

        if let Some(subscription) = &self.subscription {
            if !subscription.is_subscribed(user_id).await {
                debug!("User {} is not subscribed to the required channel", user_id);
                return Self::denied(&self.settings.subscribe_text, "subscribe");
            }
        }

        let query = SearchQuery::parse(raw_query);
        let offset = parse_offset(offset_token);
        let request = SearchRequest {
            term: query.term.clone(),
            file_type: query.file_type.clone(),
            max_results: self.settings.max_results,
            offset,
            use_caption_filter: self.settings.use_caption_filter,
        };

        let page = self.index.search(&request).await.unwrap_or_else(|e| {
            error!("File index search for {:?} failed: {}", request.term, e);
            SearchResultPage::default()
        });
        debug!(
            "Inline search {:?} (type {:?}, offset {}) for user {}: {} of {}",
            query.term,
            query.file_type,
            offset,
            user_id,
            page.files.len(),
            page.total
        );

        let results: Vec<DisplayResult> = page
            .files
            .iter()
            .enumerate()
            .map(|(i, file)| self.display(file, offset, i))
            .collect();

        if results.is_empty() {
            let mut button_text = "❌ No results".to_string();
            if !query.term.is_empty() {
                button_text.push_str(&format!(" for \"{}\"", query.term));
            }
            return InlineAnswer {
                results,
                reply_markup: None,
                is_personal: true,
                cache_time: self.cache_time(),
                button_text,
                button_param: "okay".to_string(),
                next_offset: None,
            };
        }

        let mut button_text = format!("📁 Results - {}", page.total);
        if !query.term.is_empty() {
            button_text.push_str(&format!(" for {}", query.term));
        }

        InlineAnswer {
            results,
            reply_markup: Some(self.reply_markup(&query.term)),
            is_personal: true,
            cache_time: self.cache_time(),
            button_text,
            button_param: "start".to_string(),
            next_offset: Some(
                page.next_offset
                    .map(|next| next.to_string())
                    .unwrap_or_default(),
            ),
        }
    }
}

/// Sends a prepared answer for the given query
pub async fn send_answer(
    bot: &Bot,
    query: &InlineQuery,
    answer: InlineAnswer,
) -> Result<(), AnswerError> {
    let InlineAnswer {
        results,
        reply_markup,
        is_personal,
        cache_time,
        button_text,
        button_param,
        next_offset,
    } = answer;

    let results: Vec<InlineQueryResult> = results
        .into_iter()
        .map(|result| {
            let mut document =
                InlineQueryResultCachedDocument::new(result.id, result.title, FileId(result.file_id));
            document.description = Some(result.description);
            document.caption = Some(result.caption);
            document.reply_markup = reply_markup.clone();
            InlineQueryResult::CachedDocument(document)
        })
        .collect();

    let mut request = bot
        .answer_inline_query(query.id.clone(), results)
        .cache_time(cache_time)
        .button(InlineQueryResultsButton {
            text: button_text,
            kind: InlineQueryResultsButtonKind::StartParameter(button_param),
        });
    if is_personal {
        request = request.is_personal(true);
    }
    if let Some(next_offset) = next_offset {
        request = request.next_offset(next_offset);
    }

    request.await?;
    Ok(())
}

/// Inline query endpoint
///
/// Send failures never reach the dispatcher: an expired query is ignored,
/// anything else is logged.
pub async fn inline_handler(
    bot: Bot,
    query: InlineQuery,
    search: Arc<InlineSearch>,
) -> ResponseResult<()> {
    let answer = search
        .prepare(query.from.id, &query.query, &query.offset)
        .await;
    let count = answer.results.len();

    match send_answer(&bot, &query, answer).await {
        Ok(()) => info!("Answered inline query from {} with {} results", query.from.id, count),
        Err(AnswerError::QueryExpired) => {
            debug!("Inline query from {} expired before the answer", query.from.id)
        }
        Err(e) => error!("Failed to answer inline query from {}: {}", query.from.id, e),
    }

    Ok(())
}
