//! Single-slot staging buffers behind the create/edit forms.
//!
//! Starting a flow always clears the buffer and its child rows first, so at
//! most one root row of each deep-copy type exists. The staged row is only
//! turned into a request body by [`assemble_post_data`].

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    dao::{
        PersistenceResult, PersistenceStack, Row,
        access::{
            Filter, RowBatch, Sort, delete_objects, replace_all, retrieve_entity, retrieve_object,
            retrieve_objects, retrieve_rows,
        },
        models::{
            Class, ClassPlayer, Clue, ClueChoice, Course, DeepCopyClass, DeepCopyClassPlayer,
            DeepCopyClue, DeepCopyClueChoice, DeepCopyCourse, DeepCopyGame, DeepCopyGameClass,
            DeepCopyGameClue, DeepCopySidekick, DeepCopyTreasure, DeepCopyUser, Entity,
            EntityName, Game, GameClass, GameClue, Sidekick, Treasure, User,
        },
    },
    dto::parse::Timestamp,
};

/// Request keys accepted by the user endpoints.
pub const USER_POST_KEYS: &[&str] = &[
    "type",
    "username",
    "password",
    "firstname",
    "lastname",
    "email",
    "gender",
    "birthday",
    "home_address",
    "contact_number",
];
/// Request keys accepted by the course endpoints.
pub const COURSE_POST_KEYS: &[&str] = &[
    "course_code",
    "course_title",
    "course_description",
    "course_unit",
];
/// Request keys accepted by the class endpoints.
pub const CLASS_POST_KEYS: &[&str] = &["class_code", "schedule", "room", "course_id"];
/// Request keys accepted by the clue endpoints.
pub const CLUE_POST_KEYS: &[&str] = &[
    "type",
    "riddle",
    "answer",
    "points",
    "points_on_attempt",
    "clue",
    "longitude",
    "latitude",
    "location_name",
];
/// Request keys accepted by the treasure endpoints.
pub const TREASURE_POST_KEYS: &[&str] = &[
    "name",
    "treasure_description",
    "points",
    "longitude",
    "latitude",
    "location_name",
    "model_type",
];
/// Request keys accepted by the game endpoints.
pub const GAME_POST_KEYS: &[&str] = &[
    "name",
    "description",
    "start_time",
    "end_time",
    "is_time_bound",
    "minutes_solved",
    "is_no_expiration",
    "is_secure",
    "treasure_id",
];
/// Request keys accepted by the sidekick endpoints.
pub const SIDEKICK_POST_KEYS: &[&str] = &["type", "name"];

/// Scalar read out of a staged row for a request body.
#[derive(Debug, Clone, PartialEq)]
pub enum PostValue {
    /// String value.
    Text(String),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Timestamp value.
    Date(Timestamp),
}

impl PostValue {
    /// Wire form: timestamps in server format, booleans as `1`/`0`.
    pub fn to_post_string(&self) -> String {
        match self {
            PostValue::Text(text) => text.clone(),
            PostValue::Int(value) => value.to_string(),
            PostValue::Float(value) => value.to_string(),
            PostValue::Bool(flag) => String::from(if *flag { "1" } else { "0" }),
            PostValue::Date(timestamp) => timestamp.to_server_string(),
        }
    }
}

impl From<&String> for PostValue {
    fn from(value: &String) -> Self {
        PostValue::Text(value.clone())
    }
}

impl From<&i64> for PostValue {
    fn from(value: &i64) -> Self {
        PostValue::Int(*value)
    }
}

impl From<&f64> for PostValue {
    fn from(value: &f64) -> Self {
        PostValue::Float(*value)
    }
}

impl From<&bool> for PostValue {
    fn from(value: &bool) -> Self {
        PostValue::Bool(*value)
    }
}

impl From<&Timestamp> for PostValue {
    fn from(value: &Timestamp) -> Self {
        PostValue::Date(*value)
    }
}

/// Explicit request-key table of a staged entity.
pub trait PostFields {
    /// Value posted under `key`, `None` when the entity has no such key.
    fn post_field(&self, key: &str) -> Option<PostValue>;
}

macro_rules! post_fields {
    ($ty:ty { $($key:literal => $field:ident),+ $(,)? }) => {
        impl PostFields for $ty {
            fn post_field(&self, key: &str) -> Option<PostValue> {
                match key {
                    $($key => Some(PostValue::from(&self.$field)),)+
                    _ => None,
                }
            }
        }
    };
}

post_fields!(DeepCopyUser {
    "id" => id,
    "type" => user_type,
    "username" => username,
    "password" => password,
    "firstname" => firstname,
    "lastname" => lastname,
    "email" => email,
    "gender" => gender,
    "birthday" => birthday,
    "home_address" => home_address,
    "contact_number" => contact_number,
});

post_fields!(DeepCopyCourse {
    "id" => id,
    "course_code" => course_code,
    "course_title" => course_title,
    "course_description" => course_description,
    "course_unit" => course_unit,
});

post_fields!(DeepCopyClass {
    "id" => id,
    "class_code" => class_code,
    "schedule" => schedule,
    "room" => room,
    "course_id" => course_id,
    "creator_id" => creator_id,
});

post_fields!(DeepCopyClue {
    "id" => id,
    "type" => clue_type,
    "riddle" => riddle,
    "answer" => answer,
    "points" => points,
    "points_on_attempt" => points_on_attempt,
    "clue" => clue,
    "longitude" => longitude,
    "latitude" => latitude,
    "location_name" => location_name,
});

post_fields!(DeepCopyTreasure {
    "id" => id,
    "name" => name,
    "treasure_description" => treasure_description,
    "points" => points,
    "longitude" => longitude,
    "latitude" => latitude,
    "location_name" => location_name,
    "model_type" => model_type,
});

post_fields!(DeepCopyGame {
    "id" => id,
    "name" => name,
    "description" => description,
    "start_time" => start_time,
    "end_time" => end_time,
    "is_time_bound" => is_time_bound,
    "minutes_solved" => minutes_solved,
    "is_no_expiration" => is_no_expiration,
    "is_secure" => is_secure,
    "treasure_id" => treasure_id,
});

post_fields!(DeepCopySidekick {
    "id" => id,
    "type" => sidekick_type,
    "name" => name,
    "user_id" => user_id,
});

/// Stringified `whitelist` fields of `entity`, in whitelist order.
///
/// Keys the entity does not know are skipped; `None` when nothing is left.
pub fn assemble_post_data<T: PostFields>(
    entity: &T,
    whitelist: &[&str],
) -> Option<IndexMap<String, String>> {
    let fields = whitelist
        .iter()
        .filter_map(|key| {
            entity
                .post_field(key)
                .map(|value| (key.to_string(), value.to_post_string()))
        })
        .collect::<IndexMap<_, _>>();
    (!fields.is_empty()).then_some(fields)
}

/// Reset the buffers named by `batch` and fill them, holding the worker gate.
async fn restage(stack: &PersistenceStack, batch: RowBatch) -> PersistenceResult<()> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    let staged = replace_all(worker, batch).await?;
    debug!(rows = staged, "staging buffer reset");
    Ok(())
}

/// Root row of a staging buffer, `None` before any flow started.
pub async fn staged<T: Entity>(stack: &PersistenceStack) -> PersistenceResult<Option<T>> {
    retrieve_object(stack.worker(), &Filter::all(), None).await
}

/// Apply one form edit to the staged row of `T`, creating it when missing.
pub async fn update_deep_copy<T: Entity>(
    stack: &PersistenceStack,
    patch: impl FnOnce(&mut T),
) -> PersistenceResult<T> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    let Row { id, mut value } = retrieve_entity::<T>(worker, &Filter::all()).await?;
    patch(&mut value);
    worker.put(id, &value).await?;
    worker.save_cascade().await?;
    Ok(value)
}

/// Start a create (`None`) or edit (`Some`) flow for an account.
pub async fn deep_copy_user(
    stack: &PersistenceStack,
    source: Option<&User>,
) -> PersistenceResult<DeepCopyUser> {
    let copy = source
        .map(|user| DeepCopyUser {
            id: user.id,
            user_type: user.user_type,
            username: user.username.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            email: user.email.clone(),
            gender: user.gender.clone(),
            birthday: user.birthday,
            home_address: user.home_address.clone(),
            contact_number: user.contact_number.clone(),
            image_url: user.image_url.clone(),
            ..DeepCopyUser::default()
        })
        .unwrap_or_default();

    let mut batch = RowBatch::replacing(&[EntityName::DeepCopyUser]);
    batch.push(&copy)?;
    restage(stack, batch).await?;
    Ok(copy)
}

/// Start a create (`None`) or edit (`Some`) flow for a course.
pub async fn deep_copy_course(
    stack: &PersistenceStack,
    source: Option<&Course>,
) -> PersistenceResult<DeepCopyCourse> {
    let copy = source
        .map(|course| DeepCopyCourse {
            id: course.id,
            course_code: course.course_code.clone(),
            course_title: course.course_title.clone(),
            course_description: course.course_description.clone(),
            course_unit: course.course_unit.clone(),
        })
        .unwrap_or_default();

    let mut batch = RowBatch::replacing(&[EntityName::DeepCopyCourse]);
    batch.push(&copy)?;
    restage(stack, batch).await?;
    Ok(copy)
}

/// Start a class flow; editing also stages the enrolled players.
pub async fn deep_copy_class(
    stack: &PersistenceStack,
    source: Option<&Class>,
) -> PersistenceResult<DeepCopyClass> {
    let mut batch = RowBatch::replacing(&[EntityName::DeepCopyClass, EntityName::DeepCopyClassPlayer]);
    let copy = match source {
        Some(class) => {
            let players = retrieve_objects(
                stack.worker(),
                &Filter::eq(|row: &ClassPlayer| row.class_id, class.id),
                None,
            )
            .await?;
            for player in players {
                batch.push(&DeepCopyClassPlayer {
                    class_id: player.class_id,
                    player_id: player.player_id,
                    username: player.username,
                    firstname: player.firstname,
                    lastname: player.lastname,
                })?;
            }
            DeepCopyClass {
                id: class.id,
                class_code: class.class_code.clone(),
                schedule: class.schedule.clone(),
                room: class.room.clone(),
                course_id: class.course_id,
                creator_id: class.creator_id,
            }
        }
        None => DeepCopyClass::default(),
    };
    batch.push(&copy)?;
    restage(stack, batch).await?;
    Ok(copy)
}

/// Start a clue flow; editing also stages its multiple-choice options.
pub async fn deep_copy_clue(
    stack: &PersistenceStack,
    source: Option<&Clue>,
) -> PersistenceResult<DeepCopyClue> {
    let mut batch = RowBatch::replacing(&[EntityName::DeepCopyClue, EntityName::DeepCopyClueChoice]);
    let copy = match source {
        Some(clue) => {
            let choices = retrieve_objects(
                stack.worker(),
                &Filter::eq(|row: &ClueChoice| row.clue_id, clue.id),
                None,
            )
            .await?;
            for choice in choices {
                batch.push(&DeepCopyClueChoice {
                    clue_id: choice.clue_id,
                    choice: choice.choice,
                })?;
            }
            DeepCopyClue {
                id: clue.id,
                clue_type: clue.clue_type,
                riddle: clue.riddle.clone(),
                answer: clue.answer.clone(),
                points: clue.points,
                points_on_attempt: clue.points_on_attempt,
                clue: clue.clue.clone(),
                longitude: clue.longitude,
                latitude: clue.latitude,
                location_name: clue.location_name.clone(),
            }
        }
        None => DeepCopyClue::default(),
    };
    batch.push(&copy)?;
    restage(stack, batch).await?;
    Ok(copy)
}

/// Start a treasure flow; attachment paths always start blank.
pub async fn deep_copy_treasure(
    stack: &PersistenceStack,
    source: Option<&Treasure>,
) -> PersistenceResult<DeepCopyTreasure> {
    let copy = source
        .map(|treasure| DeepCopyTreasure {
            id: treasure.id,
            name: treasure.name.clone(),
            treasure_description: treasure.treasure_description.clone(),
            points: treasure.points,
            longitude: treasure.longitude,
            latitude: treasure.latitude,
            location_name: treasure.location_name.clone(),
            image_url: treasure.image_url.clone(),
            model_url: treasure.model_url.clone(),
            model_type: treasure.model_type.clone(),
            ..DeepCopyTreasure::default()
        })
        .unwrap_or_default();

    let mut batch = RowBatch::replacing(&[EntityName::DeepCopyTreasure]);
    batch.push(&copy)?;
    restage(stack, batch).await?;
    Ok(copy)
}

/// Start a game flow; editing also stages its clues in play order and the
/// classes it is assigned to.
pub async fn deep_copy_game(
    stack: &PersistenceStack,
    source: Option<&Game>,
) -> PersistenceResult<DeepCopyGame> {
    let mut batch = RowBatch::replacing(&[
        EntityName::DeepCopyGame,
        EntityName::DeepCopyGameClue,
        EntityName::DeepCopyGameClass,
    ]);
    let copy = match source {
        Some(game) => {
            let clues = retrieve_objects(
                stack.worker(),
                &Filter::eq(|row: &GameClue| row.game_id, game.id),
                Some(&Sort::by_key(|row: &GameClue| row.order)),
            )
            .await?;
            for clue in clues {
                batch.push(&DeepCopyGameClue {
                    game_id: clue.game_id,
                    clue_id: clue.clue_id,
                    order: clue.order,
                    riddle: clue.riddle,
                    location_name: clue.location_name,
                })?;
            }
            let classes = retrieve_objects(
                stack.worker(),
                &Filter::eq(|row: &GameClass| row.game_id, game.id),
                None,
            )
            .await?;
            for class in classes {
                batch.push(&DeepCopyGameClass {
                    game_id: class.game_id,
                    class_id: class.class_id,
                    class_code: class.class_code,
                })?;
            }
            DeepCopyGame {
                id: game.id,
                name: game.name.clone(),
                description: game.description.clone(),
                start_time: game.start_time,
                end_time: game.end_time,
                is_time_bound: game.is_time_bound,
                minutes_solved: game.minutes_solved,
                is_no_expiration: game.is_no_expiration,
                is_secure: game.is_secure,
                treasure_id: game.treasure_id,
            }
        }
        None => DeepCopyGame::default(),
    };
    batch.push(&copy)?;
    restage(stack, batch).await?;
    Ok(copy)
}

/// Start a sidekick flow.
pub async fn deep_copy_sidekick(
    stack: &PersistenceStack,
    source: Option<&Sidekick>,
) -> PersistenceResult<DeepCopySidekick> {
    let copy = source
        .map(|sidekick| DeepCopySidekick {
            id: sidekick.id,
            sidekick_type: sidekick.sidekick_type.clone(),
            name: sidekick.name.clone(),
            user_id: sidekick.user_id,
        })
        .unwrap_or_default();

    let mut batch = RowBatch::replacing(&[EntityName::DeepCopySidekick]);
    batch.push(&copy)?;
    restage(stack, batch).await?;
    Ok(copy)
}

// Child staging helpers. Each one runs under the worker gate and saves.

/// Stage a multiple-choice option for the clue being edited.
pub async fn add_clue_choice(stack: &PersistenceStack, choice: &str) -> PersistenceResult<()> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    let clue_id = retrieve_object::<DeepCopyClue>(worker, &Filter::all(), None)
        .await?
        .map(|clue| clue.id)
        .unwrap_or_default();
    worker
        .insert(&DeepCopyClueChoice {
            clue_id,
            choice: choice.to_string(),
        })
        .await?;
    worker.save_cascade().await
}

/// Drop a staged option by its text; returns the rows removed.
pub async fn remove_clue_choice(stack: &PersistenceStack, choice: &str) -> PersistenceResult<usize> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    let choice = choice.to_string();
    delete_objects(
        worker,
        &Filter::new(move |row: &DeepCopyClueChoice| row.choice == choice),
    )
    .await
}

/// Stage `player` for the class being edited; already staged players are kept once.
pub async fn add_class_player(stack: &PersistenceStack, player: &User) -> PersistenceResult<bool> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    let existing = retrieve_objects(
        worker,
        &Filter::eq(|row: &DeepCopyClassPlayer| row.player_id, player.id),
        None,
    )
    .await?;
    if !existing.is_empty() {
        return Ok(false);
    }
    let class_id = retrieve_object::<DeepCopyClass>(worker, &Filter::all(), None)
        .await?
        .map(|class| class.id)
        .unwrap_or_default();
    worker
        .insert(&DeepCopyClassPlayer {
            class_id,
            player_id: player.id,
            username: player.username.clone(),
            firstname: player.firstname.clone(),
            lastname: player.lastname.clone(),
        })
        .await?;
    worker.save_cascade().await?;
    Ok(true)
}

/// Unstage a player from the class being edited.
pub async fn remove_class_player(stack: &PersistenceStack, player_id: i64) -> PersistenceResult<usize> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    delete_objects(
        worker,
        &Filter::eq(|row: &DeepCopyClassPlayer| row.player_id, player_id),
    )
    .await
}

/// Append `clue` to the game being edited; returns its play order.
pub async fn add_game_clue(stack: &PersistenceStack, clue: &Clue) -> PersistenceResult<i64> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    let staged = retrieve_objects::<DeepCopyGameClue>(worker, &Filter::all(), None).await?;
    if let Some(existing) = staged.iter().find(|row| row.clue_id == clue.id) {
        return Ok(existing.order);
    }
    let game_id = retrieve_object::<DeepCopyGame>(worker, &Filter::all(), None)
        .await?
        .map(|game| game.id)
        .unwrap_or_default();
    let order = staged.iter().map(|row| row.order).max().unwrap_or(0) + 1;
    worker
        .insert(&DeepCopyGameClue {
            game_id,
            clue_id: clue.id,
            order,
            riddle: clue.riddle.clone(),
            location_name: clue.location_name.clone(),
        })
        .await?;
    worker.save_cascade().await?;
    Ok(order)
}

/// Drop `clue_id` from the game being edited and renumber the rest `1..=n`.
pub async fn remove_game_clue(stack: &PersistenceStack, clue_id: i64) -> PersistenceResult<usize> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    let rows = retrieve_rows(
        worker,
        &Filter::<DeepCopyGameClue>::all(),
        Some(&Sort::by_key(|row: &DeepCopyGameClue| row.order)),
    )
    .await?;

    let mut removed = 0;
    let mut order = 0;
    for Row { id, mut value } in rows {
        if value.clue_id == clue_id {
            worker.delete((EntityName::DeepCopyGameClue, id)).await;
            removed += 1;
            continue;
        }
        order += 1;
        if value.order != order {
            value.order = order;
            worker.put(id, &value).await?;
        }
    }
    worker.save_cascade().await?;
    Ok(removed)
}

/// Assign `class` to the game being edited; `false` when already staged.
pub async fn add_game_class(stack: &PersistenceStack, class: &Class) -> PersistenceResult<bool> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    let existing = retrieve_objects(
        worker,
        &Filter::eq(|row: &DeepCopyGameClass| row.class_id, class.id),
        None,
    )
    .await?;
    if !existing.is_empty() {
        return Ok(false);
    }
    let game_id = retrieve_object::<DeepCopyGame>(worker, &Filter::all(), None)
        .await?
        .map(|game| game.id)
        .unwrap_or_default();
    worker
        .insert(&DeepCopyGameClass {
            game_id,
            class_id: class.id,
            class_code: class.class_code.clone(),
        })
        .await?;
    worker.save_cascade().await?;
    Ok(true)
}

/// Unassign a class from the game being edited.
pub async fn remove_game_class(stack: &PersistenceStack, class_id: i64) -> PersistenceResult<usize> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    delete_objects(
        worker,
        &Filter::eq(|row: &DeepCopyGameClass| row.class_id, class_id),
    )
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::disk_store::MemoryStore;

    async fn stack() -> PersistenceStack {
        PersistenceStack::with_store(Arc::new(MemoryStore::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_flow_twice_leaves_one_blank_row() {
        let stack = stack().await;
        update_deep_copy::<DeepCopyCourse>(&stack, |course| course.course_code = "CS 101".into())
            .await
            .unwrap();

        deep_copy_course(&stack, None).await.unwrap();
        deep_copy_course(&stack, None).await.unwrap();

        let rows = retrieve_objects::<DeepCopyCourse>(stack.main(), &Filter::all(), None)
            .await
            .unwrap();
        assert_eq!(rows, vec![DeepCopyCourse::default()]);
    }

    #[tokio::test]
    async fn edit_flow_copies_scalars_and_children() {
        let stack = stack().await;
        let worker = stack.worker();
        for choice in ["Mango", "Banana"] {
            worker
                .insert(&ClueChoice {
                    clue_id: 4,
                    choice: choice.into(),
                })
                .await
                .unwrap();
        }
        worker
            .insert(&ClueChoice {
                clue_id: 5,
                choice: "Other".into(),
            })
            .await
            .unwrap();
        worker.save_cascade().await.unwrap();

        let source = Clue {
            id: 4,
            riddle: "Yellow and curved".into(),
            answer: "Banana".into(),
            points: 10,
            ..Clue::default()
        };
        let copy = deep_copy_clue(&stack, Some(&source)).await.unwrap();
        assert_eq!(copy.id, 4);
        assert_eq!(copy.answer, "Banana");

        let choices = retrieve_objects::<DeepCopyClueChoice>(stack.main(), &Filter::all(), None)
            .await
            .unwrap();
        assert_eq!(choices.len(), 2);
        assert!(choices.iter().all(|choice| choice.clue_id == 4));

        // Switching to create drops the staged choices.
        deep_copy_clue(&stack, None).await.unwrap();
        let choices = retrieve_objects::<DeepCopyClueChoice>(stack.main(), &Filter::all(), None)
            .await
            .unwrap();
        assert!(choices.is_empty());
    }

    #[tokio::test]
    async fn staged_row_round_trips_into_post_body() {
        let stack = stack().await;
        deep_copy_game(&stack, None).await.unwrap();
        update_deep_copy::<DeepCopyGame>(&stack, |game| {
            game.name = "Campus Hunt".into();
            game.is_time_bound = true;
            game.start_time = Timestamp::parse_server("2017-02-01 08:00:00").unwrap();
            game.treasure_id = 3;
        })
        .await
        .unwrap();

        let game = staged::<DeepCopyGame>(&stack).await.unwrap().unwrap();
        let body = assemble_post_data(&game, &["name", "is_time_bound", "start_time", "treasure_id"])
            .unwrap();
        let pairs: Vec<(&str, &str)> = body.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("name", "Campus Hunt"),
                ("is_time_bound", "1"),
                ("start_time", "2017-02-01 08:00:00"),
                ("treasure_id", "3"),
            ]
        );
    }

    #[test]
    fn unknown_whitelist_yields_none() {
        assert!(assemble_post_data(&DeepCopyCourse::default(), &["colour"]).is_none());
        assert!(assemble_post_data(&DeepCopyCourse::default(), &[]).is_none());

        let sidekick = DeepCopySidekick {
            sidekick_type: "owl".into(),
            ..DeepCopySidekick::default()
        };
        let body = assemble_post_data(&sidekick, SIDEKICK_POST_KEYS).unwrap();
        assert_eq!(body["type"], "owl");
        assert_eq!(body["name"], "");
    }

    #[tokio::test]
    async fn game_clues_stay_contiguous() {
        let stack = stack().await;
        deep_copy_game(&stack, None).await.unwrap();
        for id in 1..=3 {
            let clue = Clue {
                id,
                ..Clue::default()
            };
            assert_eq!(add_game_clue(&stack, &clue).await.unwrap(), id);
        }

        assert_eq!(remove_game_clue(&stack, 2).await.unwrap(), 1);
        let sort = Sort::by_key(|row: &DeepCopyGameClue| row.order);
        let staged = retrieve_objects(stack.main(), &Filter::all(), Some(&sort))
            .await
            .unwrap();
        let pairs: Vec<(i64, i64)> = staged.iter().map(|row| (row.clue_id, row.order)).collect();
        assert_eq!(pairs, vec![(1, 1), (3, 2)]);
    }

    #[tokio::test]
    async fn class_players_are_staged_once() {
        let stack = stack().await;
        deep_copy_class(&stack, None).await.unwrap();
        let player = User {
            id: 21,
            username: "maria".into(),
            ..User::default()
        };
        assert!(add_class_player(&stack, &player).await.unwrap());
        assert!(!add_class_player(&stack, &player).await.unwrap());
        assert_eq!(remove_class_player(&stack, 21).await.unwrap(), 1);
    }
}
