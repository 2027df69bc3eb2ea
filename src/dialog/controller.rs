//! The conversation controller.
//!
//! One [`Dialog`] serves every user. Each inbound message is handled to
//! completion before the next one: commands first, then the handler of the
//! user's current [`DialogState`]. Every handled message produces exactly one
//! reply, including when a store call fails.

use std::sync::Arc;

use chrono::Datelike;
use tracing::{debug, error, info, warn};

use crate::channels::{Channel, IncomingMessage, Keyboard, OutgoingMessage};
use crate::config::SearchConfig;
use crate::dialog::prompts::{self, Answer, Command};
use crate::dialog::state::{DialogState, Sessions};
use crate::error::{DatabaseError, Result};
use crate::model::{Profile, ProfileField, RemoteProfile};
use crate::search::SearchEngine;
use crate::social::SocialGraph;
use crate::store::ProfileStore;

/// A handler's outcome: the reply, plus the candidate it presents, if any.
struct Reply {
    message: OutgoingMessage,
    delivered: Option<i64>,
}

impl From<OutgoingMessage> for Reply {
    fn from(message: OutgoingMessage) -> Self {
        Self {
            message,
            delivered: None,
        }
    }
}

pub struct Dialog {
    store: Arc<dyn ProfileStore>,
    graph: Arc<dyn SocialGraph>,
    channel: Arc<dyn Channel>,
    engine: SearchEngine,
    sessions: Sessions,
}

impl Dialog {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        graph: Arc<dyn SocialGraph>,
        channel: Arc<dyn Channel>,
        search: SearchConfig,
    ) -> Self {
        let engine = SearchEngine::new(graph.clone(), store.clone(), search);
        Self {
            store,
            graph,
            channel,
            engine,
            sessions: Sessions::new(),
        }
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub fn state(&self, user_id: i64) -> DialogState {
        self.sessions.state(user_id)
    }

    /// Handle one inbound message and send the reply.
    ///
    /// Only a failed send is returned as an error; handler failures are
    /// answered with an apology.
    pub async fn handle(&mut self, msg: &IncomingMessage) -> Result<()> {
        if !msg.directed_at_bot {
            debug!(user_id = msg.user_id, "Ignoring message not addressed to the bot");
            return Ok(());
        }

        let reply = match self.respond(msg).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(user_id = msg.user_id, "Dialog handler failed: {e}");
                OutgoingMessage::text(msg.user_id, prompts::SOMETHING_WENT_WRONG)
                    .with_keyboard(prompts::main_keyboard())
                    .into()
            }
        };

        self.channel.send(reply.message).await?;

        if let Some(candidate_id) = reply.delivered {
            if let Err(e) = self.engine.mark_delivered(candidate_id).await {
                error!(candidate_id, "Failed to record delivered partner: {e}");
            }
        }
        Ok(())
    }

    async fn respond(&mut self, msg: &IncomingMessage) -> std::result::Result<Reply, DatabaseError> {
        let user_id = msg.user_id;

        match Command::parse(&msg.text) {
            Some(Command::Reset) => return Ok(self.reset(user_id).await?.into()),
            Some(Command::Cancel) => return Ok(self.cancel(user_id).into()),
            None => {}
        }

        let mut profile = self.load_profile(user_id).await?;
        let state = self.sessions.state(user_id);
        let answer = Answer::parse(&msg.text);
        debug!(user_id, %state, "Handling message");

        let message = match state {
            DialogState::Begin => self.on_begin(user_id),
            DialogState::Start => self.on_start(&profile, answer),
            DialogState::City => self.on_city(&mut profile, answer).await?,
            DialogState::Age => self.on_age(&mut profile, answer).await?,
            DialogState::Sex => self.on_sex(&mut profile, answer).await?,
            DialogState::Search => return Ok(self.on_search(user_id, answer).await),
        };
        Ok(message.into())
    }

    // ── Commands ────────────────────────────────────────────────────

    async fn reset(&mut self, user_id: i64) -> std::result::Result<OutgoingMessage, DatabaseError> {
        self.sessions.clear(user_id);
        self.store.delete_profile(user_id).await?;
        let cleared = self.store.ledger_clear_all().await?;
        info!(user_id, cleared, "Session reset");

        self.transition(user_id, DialogState::Start);
        Ok(OutgoingMessage::text(user_id, prompts::reset_notice())
            .with_keyboard(prompts::main_keyboard()))
    }

    fn cancel(&mut self, user_id: i64) -> OutgoingMessage {
        self.end_session(user_id);
        OutgoingMessage::text(user_id, prompts::CANCELLED).with_keyboard(prompts::main_keyboard())
    }

    // ── State handlers ──────────────────────────────────────────────

    fn on_begin(&mut self, user_id: i64) -> OutgoingMessage {
        self.transition(user_id, DialogState::Start);
        OutgoingMessage::text(user_id, prompts::GREETING).with_keyboard(prompts::main_keyboard())
    }

    fn on_start(&mut self, profile: &Profile, answer: Answer) -> OutgoingMessage {
        match answer {
            Answer::Yes => self.advance(profile),
            Answer::No => {
                self.end_session(profile.user_id);
                OutgoingMessage::text(profile.user_id, prompts::FAREWELL)
            }
            _ => OutgoingMessage::text(profile.user_id, prompts::NOT_UNDERSTOOD)
                .with_keyboard(prompts::main_keyboard()),
        }
    }

    async fn on_city(
        &mut self,
        profile: &mut Profile,
        answer: Answer,
    ) -> std::result::Result<OutgoingMessage, DatabaseError> {
        let user_id = profile.user_id;
        let name = match answer {
            Answer::Skip => return Ok(self.ask(user_id, ProfileField::Age)),
            Answer::Text(name) => name,
            // Yes/no/sex tokens are not city names.
            _ => return Ok(reprompt(user_id, prompts::CITY_NOT_FOUND, ProfileField::City)),
        };

        let city_id = match self.graph.resolve_city_by_name(&name).await {
            Ok(found) => found,
            Err(e) => {
                warn!(user_id, "City lookup failed: {e}");
                None
            }
        };
        let Some(city_id) = city_id else {
            return Ok(reprompt(user_id, prompts::CITY_NOT_FOUND, ProfileField::City));
        };

        let city_title = match self.graph.resolve_city_title(city_id).await {
            Ok(title) => title,
            Err(e) => {
                warn!(user_id, city_id, "City title lookup failed: {e}");
                None
            }
        };

        profile.city_id = Some(city_id);
        profile.city_title = city_title;
        *profile = self.store.upsert_profile(profile).await?;
        Ok(self.advance(profile))
    }

    async fn on_age(
        &mut self,
        profile: &mut Profile,
        answer: Answer,
    ) -> std::result::Result<OutgoingMessage, DatabaseError> {
        let user_id = profile.user_id;
        let age = match answer {
            Answer::Skip => return Ok(self.ask(user_id, ProfileField::Sex)),
            Answer::Text(text) => text.parse::<i32>().ok().filter(|age| *age > 0),
            _ => None,
        };
        let Some(age) = age else {
            return Ok(reprompt(user_id, prompts::BAD_AGE, ProfileField::Age));
        };

        profile.age = Some(age);
        *profile = self.store.upsert_profile(profile).await?;
        Ok(self.advance(profile))
    }

    async fn on_sex(
        &mut self,
        profile: &mut Profile,
        answer: Answer,
    ) -> std::result::Result<OutgoingMessage, DatabaseError> {
        let user_id = profile.user_id;
        let sex = match answer {
            Answer::Skip => {
                self.transition(user_id, DialogState::Search);
                return Ok(OutgoingMessage::text(user_id, prompts::SEARCH_ANNOUNCED)
                    .with_keyboard(prompts::main_keyboard()));
            }
            Answer::Sex(sex) => sex,
            _ => return Ok(reprompt(user_id, prompts::BAD_SEX, ProfileField::Sex)),
        };

        profile.sex = sex;
        *profile = self.store.upsert_profile(profile).await?;
        Ok(self.begin_search(profile))
    }

    async fn on_search(&mut self, user_id: i64, answer: Answer) -> Reply {
        if answer != Answer::Yes {
            self.end_session(user_id);
            return OutgoingMessage::text(user_id, prompts::SEARCH_FINISHED)
                .with_keyboard(prompts::main_keyboard())
                .into();
        }

        let Some(cursor) = self.sessions.cursor_mut(user_id) else {
            self.transition(user_id, DialogState::Start);
            return OutgoingMessage::text(user_id, prompts::SEARCH_NOT_STARTED)
                .with_keyboard(prompts::main_keyboard())
                .into();
        };

        match self.engine.next_match(cursor).await {
            Some(found) => {
                debug!(user_id, candidate_id = found.candidate.id, "Presenting candidate");
                Reply {
                    message: OutgoingMessage::text(user_id, prompts::candidate_card(&found.candidate))
                        .with_attachment(found.photos.attachment())
                        .with_keyboard(prompts::main_keyboard()),
                    delivered: Some(found.candidate.id),
                }
            }
            None => {
                info!(user_id, "Search exhausted");
                self.end_session(user_id);
                OutgoingMessage::text(user_id, prompts::SEARCH_FINISHED)
                    .with_keyboard(prompts::main_keyboard())
                    .into()
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Ask for the first missing field, or start searching if none is.
    fn advance(&mut self, profile: &Profile) -> OutgoingMessage {
        match profile.first_missing() {
            Some(field) => self.ask(profile.user_id, field),
            None => self.begin_search(profile),
        }
    }

    fn ask(&mut self, user_id: i64, field: ProfileField) -> OutgoingMessage {
        let (state, text, keyboard) = question(field);
        self.transition(user_id, state);
        OutgoingMessage::text(user_id, text).with_keyboard(keyboard)
    }

    /// Enter `Search` with a fresh cursor when the profile allows one.
    fn begin_search(&mut self, profile: &Profile) -> OutgoingMessage {
        let user_id = profile.user_id;
        match self.engine.start(profile) {
            Some(cursor) => self.sessions.set_cursor(user_id, cursor),
            None => debug!(user_id, "Profile incomplete, search not started"),
        }
        self.transition(user_id, DialogState::Search);
        OutgoingMessage::text(user_id, prompts::search_summary(profile))
            .with_keyboard(prompts::main_keyboard())
    }

    fn transition(&mut self, user_id: i64, next: DialogState) {
        debug!(user_id, from = %self.sessions.state(user_id), to = %next, "State transition");
        self.sessions.set_state(user_id, next);
    }

    fn end_session(&mut self, user_id: i64) {
        debug!(user_id, from = %self.sessions.state(user_id), "Session cleared");
        self.sessions.clear(user_id);
    }

    /// Stored profile, or a new one seeded from the social graph.
    async fn load_profile(&self, user_id: i64) -> std::result::Result<Profile, DatabaseError> {
        if let Some(profile) = self.store.get_profile(user_id).await? {
            return Ok(profile);
        }

        let remote = match self.graph.resolve_profile(user_id).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(user_id, "Profile lookup failed, starting empty: {e}");
                RemoteProfile::default()
            }
        };
        let profile = remote.into_profile(user_id, chrono::Utc::now().year());
        info!(user_id, %profile, "Created profile");
        self.store.upsert_profile(&profile).await
    }
}

/// State, prompt and keyboard for collecting a profile field.
fn question(field: ProfileField) -> (DialogState, &'static str, Keyboard) {
    match field {
        ProfileField::City => (DialogState::City, prompts::ASK_CITY, prompts::question_keyboard()),
        ProfileField::Age => (DialogState::Age, prompts::ASK_AGE, prompts::question_keyboard()),
        ProfileField::Sex => (DialogState::Sex, prompts::ASK_SEX, prompts::sex_keyboard()),
    }
}

/// Re-ask after an invalid answer; the state is unchanged.
fn reprompt(user_id: i64, text: &str, field: ProfileField) -> OutgoingMessage {
    let (_, _, keyboard) = question(field);
    OutgoingMessage::text(user_id, text).with_keyboard(keyboard)
}
