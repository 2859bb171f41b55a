//! Remote data manager: every backend endpoint goes through [`DataManager::send`]
//! and, for listings, replaces the matching cached entity sets in one worker
//! transaction.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        PersistenceResult,
        access::{Filter, RowBatch, Sort, replace_all, retrieve_objects},
        models::{
            DeepCopyClass, DeepCopyClassPlayer, DeepCopyClue, DeepCopyClueChoice, DeepCopyCourse,
            DeepCopyGame, DeepCopyGameClass, DeepCopyGameClue, DeepCopySidekick,
            DeepCopyTreasure, DeepCopyUser, Entity, UserType,
        },
    },
    dto::{
        envelope::Envelope,
        records::{
            USER_SETS, classes_batch, clues_batch, courses_batch, game_results_batch,
            games_batch, list_items, rankings_batch, sidekicks_batch, statistics_batch,
            treasures_batch, user_from_record, users_batch,
        },
    },
    error::{ApiError, Outcome},
    routes::{
        endpoints,
        fill,
        request::{ApiRequest, Attachment},
    },
    services::deep_copy::{
        CLASS_POST_KEYS, CLUE_POST_KEYS, COURSE_POST_KEYS, GAME_POST_KEYS, PostFields,
        SIDEKICK_POST_KEYS, TREASURE_POST_KEYS, USER_POST_KEYS, assemble_post_data, staged,
    },
    state::{Session, SharedContext},
};

type BatchBuilder = fn(&Value) -> PersistenceResult<RowBatch>;

/// Client for the game backend bound to the local cache.
#[derive(Clone)]
pub struct DataManager {
    ctx: SharedContext,
}

impl DataManager {
    /// Binds a manager to the shared client context.
    pub fn new(ctx: SharedContext) -> Self {
        Self { ctx }
    }

    /// The context this manager reads and writes through.
    pub fn context(&self) -> &SharedContext {
        &self.ctx
    }

    /// Send `request` and decode the envelope, turning business failures into
    /// [`ApiError::Rejected`].
    pub async fn send(&self, request: ApiRequest) -> Result<Envelope, ApiError> {
        let request_id = Uuid::new_v4();
        let method = request.method.clone();
        let path = request.path.clone();
        debug!(%request_id, %method, %path, "sending request");

        let builder = request.build(self.ctx.http(), &self.ctx.config().server_url)?;
        let result = async {
            let response = builder.send().await.map_err(ApiError::Transport)?;
            let body = response.bytes().await.map_err(ApiError::Transport)?;
            Envelope::parse(&body)?.into_success()
        }
        .await;

        match &result {
            Ok(envelope) => debug!(%request_id, %path, message = %envelope.message, "request succeeded"),
            Err(err) => warn!(%request_id, %path, error = %err, "request failed"),
        }
        result
    }

    /// Fetch a listing and replace its cached entity sets.
    async fn refresh(&self, request: ApiRequest, build: BatchBuilder) -> Result<Outcome, ApiError> {
        let path = request.path.clone();
        let envelope = self.send(request).await?;
        let batch = build(&envelope.data)?;

        let worker = self.ctx.stack().worker();
        let count = {
            let _gate = worker.perform().await;
            replace_all(worker, batch).await?
        };
        info!(%path, count, "cache refreshed");
        Ok(Outcome {
            message: envelope.message,
            count,
        })
    }

    /// Fire a write endpoint; the cache is left untouched.
    async fn write(&self, request: ApiRequest) -> Result<Outcome, ApiError> {
        let envelope = self.send(request).await?;
        Ok(Outcome {
            message: envelope.message,
            count: 0,
        })
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Sign in and cache the account as the only `User` row.
    pub async fn login(&self, username: &str, password: &str) -> Result<Outcome, ApiError> {
        let request = ApiRequest::post_json(
            fill(endpoints::LOGIN, &[])?,
            json!({ "username": username, "password": password }),
        );
        let envelope = self.send(request).await?;

        let record = list_items(&envelope.data, "user")
            .into_iter()
            .next()
            .ok_or(ApiError::MissingKeys("data"))?;
        let user = user_from_record(record);

        let mut batch = RowBatch::replacing(USER_SETS);
        batch.push(&user)?;
        let worker = self.ctx.stack().worker();
        {
            let _gate = worker.perform().await;
            replace_all(worker, batch).await?;
        }

        self.ctx
            .sign_in(Session {
                user_id: user.id,
                name: format!("{} {}", user.firstname, user.lastname).trim().to_string(),
                user_type: UserType::from_code(user.user_type),
                class_id: 0,
            })
            .await;
        Ok(Outcome {
            message: envelope.message,
            count: 1,
        })
    }

    /// Forget the signed-in account; no request is sent.
    pub async fn logout(&self) {
        self.ctx.sign_out().await;
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    /// Users visible to the requestor.
    pub async fn retrieve_users(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_USERS, &[requestor])?;
        self.refresh(ApiRequest::get(path), users_batch).await
    }

    /// Courses visible to the requestor.
    pub async fn retrieve_courses(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_COURSES, &[requestor])?;
        self.refresh(ApiRequest::get(path), courses_batch).await
    }

    /// Classes with their course, creator and enrolled players.
    pub async fn retrieve_classes(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_CLASSES, &[requestor])?;
        self.refresh(ApiRequest::get(path), classes_batch).await
    }

    /// Clues authored by the requestor, with their choices.
    pub async fn retrieve_clues(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_CLUES, &[requestor])?;
        self.refresh(ApiRequest::get(path), clues_batch).await
    }

    /// Treasures authored by the requestor.
    pub async fn retrieve_treasures(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_TREASURES, &[requestor])?;
        self.refresh(ApiRequest::get(path), treasures_batch).await
    }

    /// Games authored by the requestor, with treasure, clues and classes.
    pub async fn retrieve_games(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_GAMES, &[requestor])?;
        self.refresh(ApiRequest::get(path), games_batch).await
    }

    /// Games a player can join in `class_id`; remembers the class on the session.
    pub async fn retrieve_player_games(&self, class_id: i64) -> Result<Outcome, ApiError> {
        let player = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_PLAYER_GAMES, &[player, class_id])?;
        let outcome = self.refresh(ApiRequest::get(path), games_batch).await?;
        self.ctx.select_class(class_id).await;
        Ok(outcome)
    }

    /// The signed-in player's sidekick.
    pub async fn retrieve_sidekick(&self) -> Result<Outcome, ApiError> {
        let player = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_SIDEKICK, &[player])?;
        self.refresh(ApiRequest::get(path), sidekicks_batch).await
    }

    /// Statistics for the requestor.
    pub async fn retrieve_statistics(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_STATISTICS, &[requestor])?;
        self.refresh(ApiRequest::get(path), statistics_batch).await
    }

    /// Player rankings within `class_id`.
    pub async fn retrieve_rankings(&self, class_id: i64) -> Result<Outcome, ApiError> {
        let path = fill(endpoints::RETRIEVE_RANKINGS, &[class_id])?;
        self.refresh(ApiRequest::get(path), rankings_batch).await
    }

    /// Results recorded for `game_id`.
    pub async fn retrieve_game_results(&self, game_id: i64) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let path = fill(endpoints::RETRIEVE_GAME_RESULTS, &[game_id, requestor])?;
        self.refresh(ApiRequest::get(path), game_results_batch).await
    }

    /// Report the points a player earned in `game_id`.
    pub async fn submit_game_result(&self, game_id: i64, points: i64) -> Result<Outcome, ApiError> {
        let player = self.ctx.requestor().await?;
        let path = fill(endpoints::SUBMIT_GAME_RESULT, &[game_id, player])?;
        self.write(ApiRequest::post_json(path, json!({ "points": points })))
            .await
    }

    // ------------------------------------------------------------------
    // Writes from the staging buffers
    // ------------------------------------------------------------------

    /// Post the staged user as a new account.
    pub async fn create_user(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        self.submit_user(fill(endpoints::CREATE_USER, &[requestor])?)
            .await
    }

    /// Post the edits to the staged user.
    pub async fn update_user(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let user = staged_root::<DeepCopyUser>(self).await?;
        self.submit_user(fill(endpoints::UPDATE_USER, &[user.id, requestor])?)
            .await
    }

    /// Delete user `user_id` on the backend.
    pub async fn delete_user(&self, user_id: i64) -> Result<Outcome, ApiError> {
        self.delete(endpoints::DELETE_USER, user_id).await
    }

    /// Post the staged course as a new course.
    pub async fn create_course(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let course = staged_root::<DeepCopyCourse>(self).await?;
        let path = fill(endpoints::CREATE_COURSE, &[requestor])?;
        self.post_json(path, &course, COURSE_POST_KEYS, Map::new())
            .await
    }

    /// Post the edits to the staged course.
    pub async fn update_course(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let course = staged_root::<DeepCopyCourse>(self).await?;
        let path = fill(endpoints::UPDATE_COURSE, &[course.id, requestor])?;
        self.post_json(path, &course, COURSE_POST_KEYS, Map::new())
            .await
    }

    /// Delete course `course_id` on the backend.
    pub async fn delete_course(&self, course_id: i64) -> Result<Outcome, ApiError> {
        self.delete(endpoints::DELETE_COURSE, course_id).await
    }

    /// Post the staged class with its course, creator and players.
    pub async fn create_class(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let class = staged_root::<DeepCopyClass>(self).await?;
        let path = fill(endpoints::CREATE_CLASS, &[requestor])?;
        let extra = self.class_children().await?;
        self.post_json(path, &class, CLASS_POST_KEYS, extra).await
    }

    /// Post the edits to the staged class.
    pub async fn update_class(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let class = staged_root::<DeepCopyClass>(self).await?;
        let path = fill(endpoints::UPDATE_CLASS, &[class.id, requestor])?;
        let extra = self.class_children().await?;
        self.post_json(path, &class, CLASS_POST_KEYS, extra).await
    }

    /// Delete class `class_id` on the backend.
    pub async fn delete_class(&self, class_id: i64) -> Result<Outcome, ApiError> {
        self.delete(endpoints::DELETE_CLASS, class_id).await
    }

    /// Post the staged clue with its choices.
    pub async fn create_clue(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let clue = staged_root::<DeepCopyClue>(self).await?;
        let path = fill(endpoints::CREATE_CLUE, &[requestor])?;
        let extra = self.clue_children().await?;
        self.post_json(path, &clue, CLUE_POST_KEYS, extra).await
    }

    /// Post the edits to the staged clue.
    pub async fn update_clue(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let clue = staged_root::<DeepCopyClue>(self).await?;
        let path = fill(endpoints::UPDATE_CLUE, &[clue.id, requestor])?;
        let extra = self.clue_children().await?;
        self.post_json(path, &clue, CLUE_POST_KEYS, extra).await
    }

    /// Delete clue `clue_id` on the backend.
    pub async fn delete_clue(&self, clue_id: i64) -> Result<Outcome, ApiError> {
        self.delete(endpoints::DELETE_CLUE, clue_id).await
    }

    /// Post the staged treasure as a multipart form, image included.
    pub async fn create_treasure(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        self.submit_treasure(fill(endpoints::CREATE_TREASURE, &[requestor])?)
            .await
    }

    /// Post the edits to the staged treasure.
    pub async fn update_treasure(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let treasure = staged_root::<DeepCopyTreasure>(self).await?;
        self.submit_treasure(fill(endpoints::UPDATE_TREASURE, &[treasure.id, requestor])?)
            .await
    }

    /// Delete treasure `treasure_id` on the backend.
    pub async fn delete_treasure(&self, treasure_id: i64) -> Result<Outcome, ApiError> {
        self.delete(endpoints::DELETE_TREASURE, treasure_id).await
    }

    /// Post the staged game with its treasure, clues and classes.
    pub async fn create_game(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let game = staged_root::<DeepCopyGame>(self).await?;
        let path = fill(endpoints::CREATE_GAME, &[requestor])?;
        let extra = self.game_children().await?;
        self.post_json(path, &game, GAME_POST_KEYS, extra).await
    }

    /// Post the edits to the staged game.
    pub async fn update_game(&self) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let game = staged_root::<DeepCopyGame>(self).await?;
        let path = fill(endpoints::UPDATE_GAME, &[game.id, requestor])?;
        let extra = self.game_children().await?;
        self.post_json(path, &game, GAME_POST_KEYS, extra).await
    }

    /// Delete game `game_id` on the backend.
    pub async fn delete_game(&self, game_id: i64) -> Result<Outcome, ApiError> {
        self.delete(endpoints::DELETE_GAME, game_id).await
    }

    /// Post the staged sidekick for the signed-in player.
    pub async fn create_sidekick(&self) -> Result<Outcome, ApiError> {
        let player = self.ctx.requestor().await?;
        let sidekick = staged_root::<DeepCopySidekick>(self).await?;
        let path = fill(endpoints::CREATE_SIDEKICK, &[player])?;
        self.post_json(path, &sidekick, SIDEKICK_POST_KEYS, Map::new())
            .await
    }

    /// Post the edits to the staged sidekick.
    pub async fn update_sidekick(&self) -> Result<Outcome, ApiError> {
        let player = self.ctx.requestor().await?;
        let sidekick = staged_root::<DeepCopySidekick>(self).await?;
        let path = fill(endpoints::UPDATE_SIDEKICK, &[sidekick.id, player])?;
        self.post_json(path, &sidekick, SIDEKICK_POST_KEYS, Map::new())
            .await
    }

    async fn delete(&self, template: &'static str, id: i64) -> Result<Outcome, ApiError> {
        let requestor = self.ctx.requestor().await?;
        let path = fill(template, &[id, requestor])?;
        self.write(ApiRequest::post_json(path, json!({}))).await
    }

    /// Validate `entity`, assemble its whitelisted fields and post them as JSON
    /// together with `extra` child payloads.
    async fn post_json<T>(
        &self,
        path: String,
        entity: &T,
        whitelist: &[&str],
        extra: Map<String, Value>,
    ) -> Result<Outcome, ApiError>
    where
        T: PostFields + Validate,
    {
        let fields = validated_fields(entity, whitelist)?;
        let mut body = fields
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect::<Map<_, _>>();
        body.extend(extra);
        self.write(ApiRequest::post_json(path, Value::Object(body)))
            .await
    }

    async fn submit_user(&self, path: String) -> Result<Outcome, ApiError> {
        let user = staged_root::<DeepCopyUser>(self).await?;
        let mut fields = validated_fields(&user, USER_POST_KEYS)?;
        if user.password.is_empty() {
            fields.shift_remove("password");
        }
        let image = Attachment::optional(&user.image_path).await?;
        self.write(ApiRequest::post_form(path, fields, image, None))
            .await
    }

    async fn submit_treasure(&self, path: String) -> Result<Outcome, ApiError> {
        let treasure = staged_root::<DeepCopyTreasure>(self).await?;
        let fields = validated_fields(&treasure, TREASURE_POST_KEYS)?;
        let image = Attachment::optional(&treasure.image_path).await?;
        let model = Attachment::optional(&treasure.model_path).await?;
        self.write(ApiRequest::post_form(path, fields, image, model))
            .await
    }

    async fn class_children(&self) -> Result<Map<String, Value>, ApiError> {
        let players = retrieve_objects::<DeepCopyClassPlayer>(
            self.ctx.stack().worker(),
            &Filter::all(),
            None,
        )
        .await?;
        let mut extra = Map::new();
        extra.insert(
            "players".into(),
            players.iter().map(|player| json!(player.player_id)).collect(),
        );
        Ok(extra)
    }

    async fn clue_children(&self) -> Result<Map<String, Value>, ApiError> {
        let choices = retrieve_objects::<DeepCopyClueChoice>(
            self.ctx.stack().worker(),
            &Filter::all(),
            None,
        )
        .await?;
        let mut extra = Map::new();
        extra.insert(
            "choices".into(),
            choices.into_iter().map(|choice| Value::String(choice.choice)).collect(),
        );
        Ok(extra)
    }

    async fn game_children(&self) -> Result<Map<String, Value>, ApiError> {
        let worker = self.ctx.stack().worker();
        let clues = retrieve_objects(
            worker,
            &Filter::<DeepCopyGameClue>::all(),
            Some(&Sort::by_key(|row: &DeepCopyGameClue| row.order)),
        )
        .await?;
        let classes = retrieve_objects::<DeepCopyGameClass>(worker, &Filter::all(), None).await?;

        let mut extra = Map::new();
        extra.insert(
            "clues".into(),
            clues
                .iter()
                .map(|clue| json!({ "clue_id": clue.clue_id, "order": clue.order }))
                .collect(),
        );
        extra.insert(
            "classes".into(),
            classes.iter().map(|class| json!(class.class_id)).collect(),
        );
        Ok(extra)
    }
}

/// Staged root row of `T`, or a validation error when no flow was started.
async fn staged_root<T: Entity>(manager: &DataManager) -> Result<T, ApiError> {
    staged::<T>(manager.ctx.stack())
        .await?
        .ok_or_else(|| ApiError::Validation("Nothing to save yet".into()))
}

fn validated_fields<T>(entity: &T, whitelist: &[&str]) -> Result<IndexMap<String, String>, ApiError>
where
    T: PostFields + Validate,
{
    entity.validate()?;
    assemble_post_data(entity, whitelist)
        .ok_or_else(|| ApiError::Validation("Nothing to save yet".into()))
}
