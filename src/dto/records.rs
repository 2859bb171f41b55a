//! Field mapping from loosely typed server records to cached rows.
//!
//! Each listing endpoint has a `*_batch` function producing the [`RowBatch`]
//! that replaces its entity sets.

use serde_json::Value;

use crate::{
    dao::{
        PersistenceResult,
        access::RowBatch,
        models::{
            Class, ClassCourse, ClassCreator, ClassPlayer, Clue, ClueChoice, Course, EntityName,
            Game, GameClass, GameClue, GameClueChoice, GameResult, GameTreasure, Ranking, Sidekick,
            Statistic, Treasure, User,
        },
    },
    dto::parse::{bool_value, date_value, double_value, int_value, string_value},
};

/// Entity sets replaced by a user refresh.
pub const USER_SETS: &[EntityName] = &[EntityName::User];
const COURSE_SETS: &[EntityName] = &[EntityName::Course];
const CLASS_SETS: &[EntityName] = &[
    EntityName::Class,
    EntityName::ClassCourse,
    EntityName::ClassCreator,
    EntityName::ClassPlayer,
];
const CLUE_SETS: &[EntityName] = &[EntityName::Clue, EntityName::ClueChoice];
const TREASURE_SETS: &[EntityName] = &[EntityName::Treasure];
const GAME_SETS: &[EntityName] = &[
    EntityName::Game,
    EntityName::GameTreasure,
    EntityName::GameClue,
    EntityName::GameClueChoice,
    EntityName::GameClass,
];
const SIDEKICK_SETS: &[EntityName] = &[EntityName::Sidekick];
const STATISTIC_SETS: &[EntityName] = &[EntityName::Statistic];
const RANKING_SETS: &[EntityName] = &[EntityName::Ranking];
const GAME_RESULT_SETS: &[EntityName] = &[EntityName::GameResult];

/// Records carried by `data`: a bare array, an array under `key`, or a
/// single record object.
pub fn list_items<'a>(data: &'a Value, key: &str) -> Vec<&'a Value> {
    match data {
        Value::Array(items) => items.iter().collect(),
        Value::Object(object) => match object.get(key) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(record @ Value::Object(_)) => vec![record],
            Some(_) => Vec::new(),
            None if object.is_empty() => Vec::new(),
            None => vec![data],
        },
        _ => Vec::new(),
    }
}

fn nested<'a>(record: &'a Value, key: &str) -> Vec<&'a Value> {
    match record.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

/// Choices arrive either as plain strings or as `{"choice": ...}` objects.
fn choice_text(value: &Value) -> String {
    match value {
        Value::Object(_) => string_value(&value["choice"]),
        other => string_value(other),
    }
}

/// Decodes one user record, tolerating missing or mistyped fields.
pub fn user_from_record(record: &Value) -> User {
    User {
        id: int_value(&record["id"]),
        user_type: int_value(&record["type"]),
        username: string_value(&record["username"]),
        firstname: string_value(&record["firstname"]),
        lastname: string_value(&record["lastname"]),
        email: string_value(&record["email"]),
        gender: string_value(&record["gender"]),
        birthday: date_value(&record["birthday"]),
        home_address: string_value(&record["home_address"]),
        contact_number: string_value(&record["contact_number"]),
        image_url: string_value(&record["image_url"]),
        created_at: date_value(&record["created_at"]),
        updated_at: date_value(&record["updated_at"]),
    }
}

fn course_from_record(record: &Value) -> Course {
    Course {
        id: int_value(&record["id"]),
        course_code: string_value(&record["course_code"]),
        course_title: string_value(&record["course_title"]),
        course_description: string_value(&record["course_description"]),
        course_unit: string_value(&record["course_unit"]),
        created_at: date_value(&record["created_at"]),
        updated_at: date_value(&record["updated_at"]),
    }
}

fn class_from_record(record: &Value) -> Class {
    Class {
        id: int_value(&record["id"]),
        class_code: string_value(&record["class_code"]),
        schedule: string_value(&record["schedule"]),
        room: string_value(&record["room"]),
        course_id: int_value(&record["course_id"]),
        creator_id: int_value(&record["creator_id"]),
        created_at: date_value(&record["created_at"]),
        updated_at: date_value(&record["updated_at"]),
    }
}

fn clue_from_record(record: &Value) -> Clue {
    Clue {
        id: int_value(&record["id"]),
        clue_type: int_value(&record["type"]),
        riddle: string_value(&record["riddle"]),
        answer: string_value(&record["answer"]),
        points: int_value(&record["points"]),
        points_on_attempt: int_value(&record["points_on_attempt"]),
        clue: string_value(&record["clue"]),
        longitude: double_value(&record["longitude"]),
        latitude: double_value(&record["latitude"]),
        location_name: string_value(&record["location_name"]),
        creator_id: int_value(&record["creator_id"]),
        created_at: date_value(&record["created_at"]),
        updated_at: date_value(&record["updated_at"]),
    }
}

fn treasure_from_record(record: &Value) -> Treasure {
    Treasure {
        id: int_value(&record["id"]),
        name: string_value(&record["name"]),
        treasure_description: string_value(&record["treasure_description"]),
        points: int_value(&record["points"]),
        longitude: double_value(&record["longitude"]),
        latitude: double_value(&record["latitude"]),
        location_name: string_value(&record["location_name"]),
        image_url: string_value(&record["image_url"]),
        model_url: string_value(&record["model_url"]),
        model_type: string_value(&record["model_type"]),
        creator_id: int_value(&record["creator_id"]),
        created_at: date_value(&record["created_at"]),
        updated_at: date_value(&record["updated_at"]),
    }
}

fn game_from_record(record: &Value) -> Game {
    Game {
        id: int_value(&record["id"]),
        name: string_value(&record["name"]),
        description: string_value(&record["description"]),
        start_time: date_value(&record["start_time"]),
        end_time: date_value(&record["end_time"]),
        is_time_bound: bool_value(&record["is_time_bound"]),
        minutes_solved: int_value(&record["minutes_solved"]),
        is_no_expiration: bool_value(&record["is_no_expiration"]),
        is_secure: bool_value(&record["is_secure"]),
        creator_id: int_value(&record["creator_id"]),
        treasure_id: int_value(&record["treasure_id"]),
        created_at: date_value(&record["created_at"]),
        updated_at: date_value(&record["updated_at"]),
    }
}

fn sidekick_from_record(record: &Value) -> Sidekick {
    Sidekick {
        id: int_value(&record["id"]),
        sidekick_type: string_value(&record["type"]),
        name: string_value(&record["name"]),
        level: int_value(&record["level"]),
        points: int_value(&record["points"]),
        user_id: int_value(&record["user_id"]),
        created_at: date_value(&record["created_at"]),
        updated_at: date_value(&record["updated_at"]),
    }
}

/// Replacement batch for the users carried by a user listing.
pub fn users_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(USER_SETS);
    for record in list_items(data, "users") {
        batch.push(&user_from_record(record))?;
    }
    Ok(batch)
}

/// Replacement batch for the courses carried by a course listing.
pub fn courses_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(COURSE_SETS);
    for record in list_items(data, "courses") {
        batch.push(&course_from_record(record))?;
    }
    Ok(batch)
}

/// Replacement batch for classes and their course, creator and player links.
pub fn classes_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(CLASS_SETS);
    for record in list_items(data, "classes") {
        let class = class_from_record(record);

        if let Some(course) = record.get("course").filter(|course| course.is_object()) {
            batch.push(&ClassCourse {
                class_id: class.id,
                course_id: int_value(&course["id"]),
                course_code: string_value(&course["course_code"]),
                course_title: string_value(&course["course_title"]),
            })?;
        }
        if let Some(creator) = record.get("creator").filter(|creator| creator.is_object()) {
            batch.push(&ClassCreator {
                class_id: class.id,
                creator_id: int_value(&creator["id"]),
                firstname: string_value(&creator["firstname"]),
                lastname: string_value(&creator["lastname"]),
            })?;
        }
        for player in nested(record, "players") {
            batch.push(&ClassPlayer {
                class_id: class.id,
                player_id: int_value(&player["id"]),
                username: string_value(&player["username"]),
                firstname: string_value(&player["firstname"]),
                lastname: string_value(&player["lastname"]),
            })?;
        }

        batch.push(&class)?;
    }
    Ok(batch)
}

/// Replacement batch for clues and their answer choices.
pub fn clues_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(CLUE_SETS);
    for record in list_items(data, "clues") {
        let clue = clue_from_record(record);
        for choice in nested(record, "choices") {
            batch.push(&ClueChoice {
                clue_id: clue.id,
                choice: choice_text(choice),
            })?;
        }
        batch.push(&clue)?;
    }
    Ok(batch)
}

/// Replacement batch for the treasures carried by a treasure listing.
pub fn treasures_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(TREASURE_SETS);
    for record in list_items(data, "treasures") {
        batch.push(&treasure_from_record(record))?;
    }
    Ok(batch)
}

/// Replacement batch for games and their treasure, clue and class links.
pub fn games_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(GAME_SETS);
    for record in list_items(data, "games") {
        let game = game_from_record(record);

        if let Some(treasure) = record.get("treasure").filter(|treasure| treasure.is_object()) {
            batch.push(&GameTreasure {
                game_id: game.id,
                treasure_id: int_value(&treasure["id"]),
                name: string_value(&treasure["name"]),
                description: string_value(&treasure["treasure_description"]),
                points: int_value(&treasure["points"]),
                longitude: double_value(&treasure["longitude"]),
                latitude: double_value(&treasure["latitude"]),
                location_name: string_value(&treasure["location_name"]),
                image_url: string_value(&treasure["image_url"]),
                model_url: string_value(&treasure["model_url"]),
                is_found: bool_value(&treasure["is_found"]),
            })?;
        }

        for (index, clue) in nested(record, "clues").into_iter().enumerate() {
            let clue_id = int_value(&clue["id"]);
            let order = match int_value(&clue["order"]) {
                0 => index as i64 + 1,
                explicit => explicit,
            };
            batch.push(&GameClue {
                game_id: game.id,
                clue_id,
                order,
                clue_type: int_value(&clue["type"]),
                riddle: string_value(&clue["riddle"]),
                answer: string_value(&clue["answer"]),
                points: int_value(&clue["points"]),
                points_on_attempt: int_value(&clue["points_on_attempt"]),
                clue: string_value(&clue["clue"]),
                longitude: double_value(&clue["longitude"]),
                latitude: double_value(&clue["latitude"]),
                location_name: string_value(&clue["location_name"]),
                is_done: bool_value(&clue["is_done"]),
            })?;
            for choice in nested(clue, "choices") {
                batch.push(&GameClueChoice {
                    game_id: game.id,
                    clue_id,
                    choice: choice_text(choice),
                })?;
            }
        }

        for class in nested(record, "classes") {
            batch.push(&GameClass {
                game_id: game.id,
                class_id: int_value(&class["id"]),
                class_code: string_value(&class["class_code"]),
            })?;
        }

        batch.push(&game)?;
    }
    Ok(batch)
}

/// Replacement batch for the sidekicks carried by a sidekick listing.
pub fn sidekicks_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(SIDEKICK_SETS);
    for record in list_items(data, "sidekick") {
        batch.push(&sidekick_from_record(record))?;
    }
    Ok(batch)
}

/// Replacement batch for statistics rows.
pub fn statistics_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(STATISTIC_SETS);
    if data.is_object() {
        batch.push(&Statistic {
            admins: int_value(&data["admins"]),
            creators: int_value(&data["creators"]),
            players: int_value(&data["players"]),
            courses: int_value(&data["courses"]),
            classes: int_value(&data["classes"]),
            clues: int_value(&data["clues"]),
            treasures: int_value(&data["treasures"]),
            games: int_value(&data["games"]),
        })?;
    }
    Ok(batch)
}

/// Replacement batch for ranking rows.
pub fn rankings_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(RANKING_SETS);
    for (index, record) in list_items(data, "rankings").into_iter().enumerate() {
        let rank = match int_value(&record["rank"]) {
            0 => index as i64 + 1,
            explicit => explicit,
        };
        batch.push(&Ranking {
            rank,
            player_id: int_value(&record["player_id"]),
            username: string_value(&record["username"]),
            firstname: string_value(&record["firstname"]),
            lastname: string_value(&record["lastname"]),
            sidekick_name: string_value(&record["sidekick_name"]),
            points: int_value(&record["points"]),
        })?;
    }
    Ok(batch)
}

/// Replacement batch for game result rows.
pub fn game_results_batch(data: &Value) -> PersistenceResult<RowBatch> {
    let mut batch = RowBatch::replacing(GAME_RESULT_SETS);
    for record in list_items(data, "results") {
        batch.push(&GameResult {
            game_id: int_value(&record["game_id"]),
            player_id: int_value(&record["player_id"]),
            username: string_value(&record["username"]),
            firstname: string_value(&record["firstname"]),
            lastname: string_value(&record["lastname"]),
            points: int_value(&record["points"]),
            is_finished: bool_value(&record["is_finished"]),
            finished_at: date_value(&record["finished_at"]),
        })?;
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_items_accepts_every_shape() {
        let bare = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(list_items(&bare, "users").len(), 2);

        let keyed = json!({"users": [{"id": 1}]});
        assert_eq!(list_items(&keyed, "users").len(), 1);

        let single = json!({"id": 1, "username": "juan"});
        assert_eq!(list_items(&single, "users").len(), 1);

        assert!(list_items(&json!({}), "users").is_empty());
        assert!(list_items(&Value::Null, "users").is_empty());
    }

    #[test]
    fn user_record_coercions() {
        let user = user_from_record(&json!({
            "id": "12",
            "type": 2,
            "username": "juan",
            "email": "<null>",
            "birthday": "2001-06-30 00:00:00",
            "contact_number": 9171234567i64,
        }));
        assert_eq!(user.id, 12);
        assert_eq!(user.user_type, 2);
        assert_eq!(user.email, "");
        assert_eq!(user.birthday.to_server_string(), "2001-06-30 00:00:00");
        assert_eq!(user.contact_number, "9171234567");
        assert_eq!(user.firstname, "");
    }

    #[test]
    fn class_batch_stages_children() {
        let batch = classes_batch(&json!([{
            "id": 3,
            "class_code": "A1",
            "course": {"id": 9, "course_code": "SCI1", "course_title": "Science"},
            "creator": {"id": 4, "firstname": "Ana", "lastname": "Reyes"},
            "players": [{"id": 20}, {"id": 21}],
        }]))
        .unwrap();

        assert_eq!(batch.count(EntityName::Class), 1);
        assert_eq!(batch.count(EntityName::ClassCourse), 1);
        assert_eq!(batch.count(EntityName::ClassCreator), 1);
        assert_eq!(batch.count(EntityName::ClassPlayer), 2);
    }

    #[test]
    fn game_batch_orders_clues_and_choices() {
        let batch = games_batch(&json!({"games": [{
            "id": 5,
            "name": "Campus Hunt",
            "treasure": {"id": 8, "name": "Golden Owl", "latitude": "14.6", "longitude": "121.0"},
            "clues": [
                {"id": 31, "riddle": "first", "choices": ["A", {"choice": "B"}]},
                {"id": 32, "order": 7, "riddle": "second"},
            ],
            "classes": [{"id": 3, "class_code": "A1"}],
        }]}))
        .unwrap();

        assert_eq!(batch.count(EntityName::Game), 1);
        assert_eq!(batch.count(EntityName::GameTreasure), 1);
        assert_eq!(batch.count(EntityName::GameClue), 2);
        assert_eq!(batch.count(EntityName::GameClueChoice), 2);
        assert_eq!(batch.count(EntityName::GameClass), 1);
    }

    #[test]
    fn rankings_fill_missing_rank_from_position() {
        let batch = rankings_batch(&json!([{"player_id": 1}, {"player_id": 2}])).unwrap();
        assert_eq!(batch.count(EntityName::Ranking), 2);
    }

    #[test]
    fn statistics_require_object() {
        assert_eq!(
            statistics_batch(&json!({"players": "40"}))
                .unwrap()
                .count(EntityName::Statistic),
            1
        );
        assert!(statistics_batch(&json!([])).unwrap().is_empty());
    }
}
