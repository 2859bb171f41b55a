use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::dto::parse::Timestamp;

/// Row type stored by the persistence stack.
///
/// `Default` is the blank row inserted by get-or-create lookups.
pub trait Entity: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Entity set the row belongs to.
    const NAME: EntityName;
}

/// Every entity set known to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityName {
    /// [`User`] rows.
    User,
    /// [`Course`] rows.
    Course,
    /// [`Class`] rows.
    Class,
    /// [`ClassCourse`] rows.
    ClassCourse,
    /// [`ClassCreator`] rows.
    ClassCreator,
    /// [`ClassPlayer`] rows.
    ClassPlayer,
    /// [`Clue`] rows.
    Clue,
    /// [`ClueChoice`] rows.
    ClueChoice,
    /// [`Treasure`] rows.
    Treasure,
    /// [`Game`] rows.
    Game,
    /// [`GameTreasure`] rows.
    GameTreasure,
    /// [`GameClue`] rows.
    GameClue,
    /// [`GameClueChoice`] rows.
    GameClueChoice,
    /// [`GameClass`] rows.
    GameClass,
    /// [`Sidekick`] rows.
    Sidekick,
    /// [`Statistic`] rows.
    Statistic,
    /// [`Ranking`] rows.
    Ranking,
    /// [`GameResult`] rows.
    GameResult,
    /// [`DeepCopyUser`] rows.
    DeepCopyUser,
    /// [`DeepCopyCourse`] rows.
    DeepCopyCourse,
    /// [`DeepCopyClass`] rows.
    DeepCopyClass,
    /// [`DeepCopyClassPlayer`] rows.
    DeepCopyClassPlayer,
    /// [`DeepCopyClue`] rows.
    DeepCopyClue,
    /// [`DeepCopyClueChoice`] rows.
    DeepCopyClueChoice,
    /// [`DeepCopyTreasure`] rows.
    DeepCopyTreasure,
    /// [`DeepCopyGame`] rows.
    DeepCopyGame,
    /// [`DeepCopyGameClue`] rows.
    DeepCopyGameClue,
    /// [`DeepCopyGameClass`] rows.
    DeepCopyGameClass,
    /// [`DeepCopySidekick`] rows.
    DeepCopySidekick,
}

impl EntityName {
    /// All entity sets in schema order; feeds the store fingerprint.
    pub const ALL: [EntityName; 29] = [
        EntityName::User,
        EntityName::Course,
        EntityName::Class,
        EntityName::ClassCourse,
        EntityName::ClassCreator,
        EntityName::ClassPlayer,
        EntityName::Clue,
        EntityName::ClueChoice,
        EntityName::Treasure,
        EntityName::Game,
        EntityName::GameTreasure,
        EntityName::GameClue,
        EntityName::GameClueChoice,
        EntityName::GameClass,
        EntityName::Sidekick,
        EntityName::Statistic,
        EntityName::Ranking,
        EntityName::GameResult,
        EntityName::DeepCopyUser,
        EntityName::DeepCopyCourse,
        EntityName::DeepCopyClass,
        EntityName::DeepCopyClassPlayer,
        EntityName::DeepCopyClue,
        EntityName::DeepCopyClueChoice,
        EntityName::DeepCopyTreasure,
        EntityName::DeepCopyGame,
        EntityName::DeepCopyGameClue,
        EntityName::DeepCopyGameClass,
        EntityName::DeepCopySidekick,
    ];

    /// Name stored in the `entity` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityName::User => "User",
            EntityName::Course => "Course",
            EntityName::Class => "Class",
            EntityName::ClassCourse => "ClassCourse",
            EntityName::ClassCreator => "ClassCreator",
            EntityName::ClassPlayer => "ClassPlayer",
            EntityName::Clue => "Clue",
            EntityName::ClueChoice => "ClueChoice",
            EntityName::Treasure => "Treasure",
            EntityName::Game => "Game",
            EntityName::GameTreasure => "GameTreasure",
            EntityName::GameClue => "GameClue",
            EntityName::GameClueChoice => "GameClueChoice",
            EntityName::GameClass => "GameClass",
            EntityName::Sidekick => "Sidekick",
            EntityName::Statistic => "Statistic",
            EntityName::Ranking => "Ranking",
            EntityName::GameResult => "GameResult",
            EntityName::DeepCopyUser => "DeepCopyUser",
            EntityName::DeepCopyCourse => "DeepCopyCourse",
            EntityName::DeepCopyClass => "DeepCopyClass",
            EntityName::DeepCopyClassPlayer => "DeepCopyClassPlayer",
            EntityName::DeepCopyClue => "DeepCopyClue",
            EntityName::DeepCopyClueChoice => "DeepCopyClueChoice",
            EntityName::DeepCopyTreasure => "DeepCopyTreasure",
            EntityName::DeepCopyGame => "DeepCopyGame",
            EntityName::DeepCopyGameClue => "DeepCopyGameClue",
            EntityName::DeepCopyGameClass => "DeepCopyGameClass",
            EntityName::DeepCopySidekick => "DeepCopySidekick",
        }
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityName {
    type Err = UnknownEntity;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EntityName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == value)
            .ok_or_else(|| UnknownEntity(value.to_string()))
    }
}

/// Entity name read from disk that the compiled schema does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity `{0}`")]
pub struct UnknownEntity(pub String);

macro_rules! entity {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl Entity for $ty {
                const NAME: EntityName = EntityName::$ty;
            }
        )+
    };
}

entity!(
    User,
    Course,
    Class,
    ClassCourse,
    ClassCreator,
    ClassPlayer,
    Clue,
    ClueChoice,
    Treasure,
    Game,
    GameTreasure,
    GameClue,
    GameClueChoice,
    GameClass,
    Sidekick,
    Statistic,
    Ranking,
    GameResult,
    DeepCopyUser,
    DeepCopyCourse,
    DeepCopyClass,
    DeepCopyClassPlayer,
    DeepCopyClue,
    DeepCopyClueChoice,
    DeepCopyTreasure,
    DeepCopyGame,
    DeepCopyGameClue,
    DeepCopyGameClass,
    DeepCopySidekick,
);

/// Account role as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    /// Manages accounts, courses and classes.
    Administrator,
    /// Authors clues, treasures and games.
    Creator,
    /// Joins games through a class.
    Player,
}

impl UserType {
    /// Role for a server `type` code; unknown codes give `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(UserType::Administrator),
            1 => Some(UserType::Creator),
            2 => Some(UserType::Player),
            _ => None,
        }
    }

    /// Server `type` code of the role.
    pub fn code(&self) -> i64 {
        match self {
            UserType::Administrator => 0,
            UserType::Creator => 1,
            UserType::Player => 2,
        }
    }
}

// Mirror entities: disposable copies of the last listing response.

/// Cached account row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Server identifier.
    pub id: i64,
    /// Role code: `0` administrator, `1` creator, `2` player.
    pub user_type: i64,
    /// Login name.
    pub username: String,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
    /// Contact email address.
    pub email: String,
    /// Gender label as entered.
    pub gender: String,
    /// Date of birth.
    pub birthday: Timestamp,
    /// Postal address.
    pub home_address: String,
    /// Phone number as entered.
    pub contact_number: String,
    /// Remote image URL.
    pub image_url: String,
    /// Server creation time.
    pub created_at: Timestamp,
    /// Server last-update time.
    pub updated_at: Timestamp,
}

/// Cached course row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Server identifier.
    pub id: i64,
    /// Short course code such as `CS 101`.
    pub course_code: String,
    /// Course title.
    pub course_title: String,
    /// Course description.
    pub course_description: String,
    /// Credit units as sent by the server.
    pub course_unit: String,
    /// Server creation time.
    pub created_at: Timestamp,
    /// Server last-update time.
    pub updated_at: Timestamp,
}

/// Cached class row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Class {
    /// Server identifier.
    pub id: i64,
    /// Section code.
    pub class_code: String,
    /// Meeting schedule.
    pub schedule: String,
    /// Meeting room.
    pub room: String,
    /// Course the class belongs to.
    pub course_id: i64,
    /// Account that authored the row.
    pub creator_id: i64,
    /// Server creation time.
    pub created_at: Timestamp,
    /// Server last-update time.
    pub updated_at: Timestamp,
}

/// Course summary embedded in a class listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassCourse {
    /// Owning class.
    pub class_id: i64,
    /// Course id.
    pub course_id: i64,
    /// Short course code such as `CS 101`.
    pub course_code: String,
    /// Course title.
    pub course_title: String,
}

/// Author summary embedded in a class listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassCreator {
    /// Owning class.
    pub class_id: i64,
    /// Creator account id.
    pub creator_id: i64,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
}

/// Player enrolled in a class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassPlayer {
    /// Owning class.
    pub class_id: i64,
    /// Player account id.
    pub player_id: i64,
    /// Login name.
    pub username: String,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
}

/// Cached clue row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clue {
    /// Server identifier.
    pub id: i64,
    /// Clue kind code.
    pub clue_type: i64,
    /// Riddle shown to the player.
    pub riddle: String,
    /// Expected answer.
    pub answer: String,
    /// Points awarded.
    pub points: i64,
    /// Points awarded when solved after a wrong attempt.
    pub points_on_attempt: i64,
    /// Hint text.
    pub clue: String,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// Place name shown with the map pin.
    pub location_name: String,
    /// Account that authored the row.
    pub creator_id: i64,
    /// Server creation time.
    pub created_at: Timestamp,
    /// Server last-update time.
    pub updated_at: Timestamp,
}

/// Multiple-choice option of a cached clue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClueChoice {
    /// Clue id.
    pub clue_id: i64,
    /// Option text.
    pub choice: String,
}

/// Cached treasure row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Treasure {
    /// Server identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Treasure description.
    pub treasure_description: String,
    /// Points awarded.
    pub points: i64,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// Place name shown with the map pin.
    pub location_name: String,
    /// Remote image URL.
    pub image_url: String,
    /// Remote 3D model URL.
    pub model_url: String,
    /// 3D model format label.
    pub model_type: String,
    /// Account that authored the row.
    pub creator_id: i64,
    /// Server creation time.
    pub created_at: Timestamp,
    /// Server last-update time.
    pub updated_at: Timestamp,
}

/// Cached game row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Server identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Free text description.
    pub description: String,
    /// Start of the play window.
    pub start_time: Timestamp,
    /// End of the play window.
    pub end_time: Timestamp,
    /// Only playable between `start_time` and `end_time`.
    pub is_time_bound: bool,
    /// Time limit in minutes.
    pub minutes_solved: i64,
    /// The game never expires.
    pub is_no_expiration: bool,
    /// Secure-mode flag set by the author.
    pub is_secure: bool,
    /// Account that authored the row.
    pub creator_id: i64,
    /// Treasure hidden at the end of the game.
    pub treasure_id: i64,
    /// Server creation time.
    pub created_at: Timestamp,
    /// Server last-update time.
    pub updated_at: Timestamp,
}

/// Treasure hidden at the end of a game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameTreasure {
    /// Owning game.
    pub game_id: i64,
    /// Treasure hidden at the end of the game.
    pub treasure_id: i64,
    /// Display name.
    pub name: String,
    /// Treasure description.
    pub description: String,
    /// Points awarded.
    pub points: i64,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// Place name shown with the map pin.
    pub location_name: String,
    /// Remote image URL.
    pub image_url: String,
    /// Remote 3D model URL.
    pub model_url: String,
    /// Set once the player reached the treasure.
    pub is_found: bool,
}

/// Clue as placed in a game, in play order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameClue {
    /// Owning game.
    pub game_id: i64,
    /// Clue id.
    pub clue_id: i64,
    /// 1-based play order.
    pub order: i64,
    /// Clue kind code.
    pub clue_type: i64,
    /// Riddle shown to the player.
    pub riddle: String,
    /// Expected answer.
    pub answer: String,
    /// Points awarded.
    pub points: i64,
    /// Points awarded when solved after a wrong attempt.
    pub points_on_attempt: i64,
    /// Hint text.
    pub clue: String,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// Place name shown with the map pin.
    pub location_name: String,
    /// Set once the player solved this clue.
    pub is_done: bool,
}

/// Multiple-choice option of a clue placed in a game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameClueChoice {
    /// Owning game.
    pub game_id: i64,
    /// Clue id.
    pub clue_id: i64,
    /// Option text.
    pub choice: String,
}

/// Class a game is assigned to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameClass {
    /// Owning game.
    pub game_id: i64,
    /// Class the game is assigned to.
    pub class_id: i64,
    /// Section code.
    pub class_code: String,
}

/// Player companion row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sidekick {
    /// Server identifier.
    pub id: i64,
    /// Sidekick kind.
    pub sidekick_type: String,
    /// Display name.
    pub name: String,
    /// Sidekick level.
    pub level: i64,
    /// Points collected by the sidekick.
    pub points: i64,
    /// Owning account.
    pub user_id: i64,
    /// Server creation time.
    pub created_at: Timestamp,
    /// Server last-update time.
    pub updated_at: Timestamp,
}

/// Dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    /// Administrator accounts.
    pub admins: i64,
    /// Creator accounts.
    pub creators: i64,
    /// Player accounts.
    pub players: i64,
    /// Courses.
    pub courses: i64,
    /// Classes.
    pub classes: i64,
    /// Clues.
    pub clues: i64,
    /// Treasures.
    pub treasures: i64,
    /// Games.
    pub games: i64,
}

/// Leaderboard entry of a class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// 1-based leaderboard position.
    pub rank: i64,
    /// Player account id.
    pub player_id: i64,
    /// Login name.
    pub username: String,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
    /// Name of the player's sidekick.
    pub sidekick_name: String,
    /// Total points in the class.
    pub points: i64,
}

/// Result of one player in a game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    /// Owning game.
    pub game_id: i64,
    /// Player account id.
    pub player_id: i64,
    /// Login name.
    pub username: String,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
    /// Points earned in the game.
    pub points: i64,
    /// The player reached the treasure.
    pub is_finished: bool,
    /// Completion time.
    pub finished_at: Timestamp,
}

// Deep-copy entities: single-slot edit buffers behind create/edit forms.

/// Account form buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyUser {
    /// Server identifier; `0` while creating.
    pub id: i64,
    /// Role code: `0` administrator, `1` creator, `2` player.
    pub user_type: i64,
    /// Login name.
    pub username: String,
    /// Password typed into the form; empty on an edit keeps the current one.
    pub password: String,
    /// Repeat of `password`, checked before sending.
    pub confirm_password: String,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
    /// Contact email address.
    pub email: String,
    /// Gender label as entered.
    pub gender: String,
    /// Date of birth.
    pub birthday: Timestamp,
    /// Postal address.
    pub home_address: String,
    /// Phone number as entered.
    pub contact_number: String,
    /// Remote image URL.
    pub image_url: String,
    /// Local file staged for the avatar attachment.
    pub image_path: String,
}

/// Course form buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyCourse {
    /// Server identifier; `0` while creating.
    pub id: i64,
    /// Short course code such as `CS 101`.
    pub course_code: String,
    /// Course title.
    pub course_title: String,
    /// Course description.
    pub course_description: String,
    /// Credit units as sent by the server.
    pub course_unit: String,
}

/// Class form buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyClass {
    /// Server identifier; `0` while creating.
    pub id: i64,
    /// Section code.
    pub class_code: String,
    /// Meeting schedule.
    pub schedule: String,
    /// Meeting room.
    pub room: String,
    /// Course the class belongs to.
    pub course_id: i64,
    /// Account that authored the row.
    pub creator_id: i64,
}

/// Player staged for the class being edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyClassPlayer {
    /// Owning class.
    pub class_id: i64,
    /// Player account id.
    pub player_id: i64,
    /// Login name.
    pub username: String,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
}

/// Clue form buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyClue {
    /// Server identifier; `0` while creating.
    pub id: i64,
    /// Clue kind code.
    pub clue_type: i64,
    /// Riddle shown to the player.
    pub riddle: String,
    /// Expected answer.
    pub answer: String,
    /// Points awarded.
    pub points: i64,
    /// Points awarded when solved after a wrong attempt.
    pub points_on_attempt: i64,
    /// Hint text.
    pub clue: String,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// Place name shown with the map pin.
    pub location_name: String,
}

/// Option staged for the clue being edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyClueChoice {
    /// Clue id.
    pub clue_id: i64,
    /// Option text.
    pub choice: String,
}

/// Treasure form buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyTreasure {
    /// Server identifier; `0` while creating.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Treasure description.
    pub treasure_description: String,
    /// Points awarded.
    pub points: i64,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// Place name shown with the map pin.
    pub location_name: String,
    /// Remote image URL.
    pub image_url: String,
    /// Remote 3D model URL.
    pub model_url: String,
    /// 3D model format label.
    pub model_type: String,
    /// Local file staged for the image attachment.
    pub image_path: String,
    /// Local file staged for the 3D model attachment.
    pub model_path: String,
}

/// Game form buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyGame {
    /// Server identifier; `0` while creating.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Free text description.
    pub description: String,
    /// Start of the play window.
    pub start_time: Timestamp,
    /// End of the play window.
    pub end_time: Timestamp,
    /// Only playable between `start_time` and `end_time`.
    pub is_time_bound: bool,
    /// Time limit in minutes.
    pub minutes_solved: i64,
    /// The game never expires.
    pub is_no_expiration: bool,
    /// Secure-mode flag set by the author.
    pub is_secure: bool,
    /// Treasure hidden at the end of the game.
    pub treasure_id: i64,
}

/// Clue staged for the game being edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyGameClue {
    /// Owning game.
    pub game_id: i64,
    /// Clue id.
    pub clue_id: i64,
    /// 1-based play order.
    pub order: i64,
    /// Riddle shown to the player.
    pub riddle: String,
    /// Place name shown with the map pin.
    pub location_name: String,
}

/// Class staged for the game being edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopyGameClass {
    /// Owning game.
    pub game_id: i64,
    /// Class the game is assigned to.
    pub class_id: i64,
    /// Section code.
    pub class_code: String,
}

/// Sidekick form buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCopySidekick {
    /// Server identifier; `0` while creating.
    pub id: i64,
    /// Sidekick kind.
    pub sidekick_type: String,
    /// Display name.
    pub name: String,
    /// Owning account.
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_names_round_trip_through_strings() {
        for name in EntityName::ALL {
            assert_eq!(name.as_str().parse::<EntityName>(), Ok(name));
        }
        assert!("Playlist".parse::<EntityName>().is_err());
    }

    #[test]
    fn user_type_codes() {
        assert_eq!(UserType::from_code(2), Some(UserType::Player));
        assert_eq!(UserType::Creator.code(), 1);
        assert_eq!(UserType::from_code(7), None);
    }
}
