//! URI templates relative to the configured server URL.

/// `POST` credentials; answers with the account record.
pub const LOGIN: &str = "login";

/// `GET` the users visible to the requestor.
pub const RETRIEVE_USERS: &str = "retrieve/users/requestor/%@";
/// `POST` a new user.
pub const CREATE_USER: &str = "create/user/requestor/%@";
/// `POST` edits to an existing user.
pub const UPDATE_USER: &str = "update/user/%@/requestor/%@";
/// `POST` removal of a user.
pub const DELETE_USER: &str = "delete/user/%@/requestor/%@";

/// `GET` the courses visible to the requestor.
pub const RETRIEVE_COURSES: &str = "retrieve/courses/requestor/%@";
/// `POST` a new course.
pub const CREATE_COURSE: &str = "create/course/requestor/%@";
/// `POST` edits to an existing course.
pub const UPDATE_COURSE: &str = "update/course/%@/requestor/%@";
/// `POST` removal of a course.
pub const DELETE_COURSE: &str = "delete/course/%@/requestor/%@";

/// `GET` the classes visible to the requestor.
pub const RETRIEVE_CLASSES: &str = "retrieve/classes/requestor/%@";
/// `POST` a new clas.
pub const CREATE_CLASS: &str = "create/class/requestor/%@";
/// `POST` edits to an existing clas.
pub const UPDATE_CLASS: &str = "update/class/%@/requestor/%@";
/// `POST` removal of a clas.
pub const DELETE_CLASS: &str = "delete/class/%@/requestor/%@";

/// `GET` the clues visible to the requestor.
pub const RETRIEVE_CLUES: &str = "retrieve/clues/requestor/%@";
/// `POST` a new clue.
pub const CREATE_CLUE: &str = "create/clue/requestor/%@";
/// `POST` edits to an existing clue.
pub const UPDATE_CLUE: &str = "update/clue/%@/requestor/%@";
/// `POST` removal of a clue.
pub const DELETE_CLUE: &str = "delete/clue/%@/requestor/%@";

/// `GET` the treasures visible to the requestor.
pub const RETRIEVE_TREASURES: &str = "retrieve/treasures/requestor/%@";
/// `POST` a new treasure.
pub const CREATE_TREASURE: &str = "create/treasure/requestor/%@";
/// `POST` edits to an existing treasure.
pub const UPDATE_TREASURE: &str = "update/treasure/%@/requestor/%@";
/// `POST` removal of a treasure.
pub const DELETE_TREASURE: &str = "delete/treasure/%@/requestor/%@";

/// `GET` the games visible to the requestor.
pub const RETRIEVE_GAMES: &str = "retrieve/games/requestor/%@";
/// `GET` the games a player can join in a class.
pub const RETRIEVE_PLAYER_GAMES: &str = "retrieve/games/player/%@/class/%@";
/// `POST` a new game.
pub const CREATE_GAME: &str = "create/game/requestor/%@";
/// `POST` edits to an existing game.
pub const UPDATE_GAME: &str = "update/game/%@/requestor/%@";
/// `POST` removal of a game.
pub const DELETE_GAME: &str = "delete/game/%@/requestor/%@";

/// `GET` the player's sidekick.
pub const RETRIEVE_SIDEKICK: &str = "retrieve/sidekick/player/%@";
/// `POST` a new sidekick for the player.
pub const CREATE_SIDEKICK: &str = "create/sidekick/player/%@";
/// `POST` edits to a sidekick of the player.
pub const UPDATE_SIDEKICK: &str = "update/sidekick/%@/player/%@";

/// `GET` dashboard counters.
pub const RETRIEVE_STATISTICS: &str = "retrieve/statistics/requestor/%@";
/// `GET` the leaderboard of a class.
pub const RETRIEVE_RANKINGS: &str = "retrieve/rankings/class/%@";
/// `GET` every player's result in a game.
pub const RETRIEVE_GAME_RESULTS: &str = "retrieve/game/results/%@/requestor/%@";
/// `POST` the points a player earned in a game.
pub const SUBMIT_GAME_RESULT: &str = "submit/game/result/%@/player/%@";
