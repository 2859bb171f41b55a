//! Device position tracking and the geofence checks used during game play.

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::dao::{
    ObjectContext, PersistenceResult, PersistenceStack,
    access::{Filter, retrieve_objects, update_objects},
    models::{GameClue, GameTreasure},
};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// A clue or treasure counts as reached within this many metres.
pub const GEOFENCE_RADIUS_M: f64 = 30.0;

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coordinate {
    /// Degrees north of the equator.
    pub latitude: f64,
    /// Degrees east of Greenwich.
    pub longitude: f64,
}

impl Coordinate {
    /// Position from degrees.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Latest known device position, published to any number of subscribers.
#[derive(Debug)]
pub struct LocationTracker {
    tx: watch::Sender<Option<Coordinate>>,
}

impl Default for LocationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationTracker {
    /// Tracker with no known position.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Location provider callback.
    pub fn update(&self, position: Coordinate) {
        self.tx.send_replace(Some(position));
    }

    /// Last published position.
    pub fn current(&self) -> Option<Coordinate> {
        *self.tx.borrow()
    }

    /// Receiver notified on every position change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Coordinate>> {
        self.tx.subscribe()
    }

    /// Position updates as a stream, starting with the current value.
    pub fn stream(&self) -> WatchStream<Option<Coordinate>> {
        WatchStream::new(self.subscribe())
    }
}

/// Great-circle distance between two positions, in metres.
pub fn haversine_distance(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Inclusive geofence test.
pub fn within_radius(distance_m: f64) -> bool {
    distance_m <= GEOFENCE_RADIUS_M
}

/// Play order of the next unsolved clue of `game_id`.
pub async fn next_clue_order(ctx: &ObjectContext, game_id: i64) -> PersistenceResult<Option<i64>> {
    let pending = retrieve_objects(
        ctx,
        &Filter::new(move |clue: &GameClue| clue.game_id == game_id && !clue.is_done),
        None,
    )
    .await?;
    Ok(pending.iter().map(|clue| clue.order).min())
}

/// The clue at `order` of `game_id` when `position` is inside its geofence.
///
/// Several rows with the same order should not exist; if they do, the last
/// stored one wins.
pub async fn retrieve_clue(
    ctx: &ObjectContext,
    position: Coordinate,
    order: i64,
    game_id: i64,
) -> PersistenceResult<Option<GameClue>> {
    let mut candidates = retrieve_objects(
        ctx,
        &Filter::eq(|clue: &GameClue| clue.game_id, game_id)
            .and(Filter::eq(|clue: &GameClue| clue.order, order)),
        None,
    )
    .await?;
    if candidates.len() > 1 {
        warn!(game_id, order, count = candidates.len(), "several clues share one order; using the last");
    }
    let Some(clue) = candidates.pop() else {
        return Ok(None);
    };

    let distance = haversine_distance(position, Coordinate::new(clue.latitude, clue.longitude));
    debug!(game_id, clue_id = clue.clue_id, distance, "clue distance");
    Ok(within_radius(distance).then_some(clue))
}

/// The treasure of `game_id` when `position` is inside its geofence.
pub async fn retrieve_treasure(
    ctx: &ObjectContext,
    position: Coordinate,
    game_id: i64,
) -> PersistenceResult<Option<GameTreasure>> {
    let mut candidates = retrieve_objects(
        ctx,
        &Filter::eq(|treasure: &GameTreasure| treasure.game_id, game_id),
        None,
    )
    .await?;
    if candidates.len() > 1 {
        warn!(game_id, count = candidates.len(), "several treasures for one game; using the last");
    }
    let Some(treasure) = candidates.pop() else {
        return Ok(None);
    };

    let distance =
        haversine_distance(position, Coordinate::new(treasure.latitude, treasure.longitude));
    debug!(game_id, treasure_id = treasure.treasure_id, distance, "treasure distance");
    Ok(within_radius(distance).then_some(treasure))
}

/// Flag a clue as solved; returns the rows updated.
pub async fn mark_clue_done(
    stack: &PersistenceStack,
    game_id: i64,
    clue_id: i64,
) -> PersistenceResult<usize> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    update_objects(
        worker,
        &Filter::eq(|clue: &GameClue| clue.game_id, game_id)
            .and(Filter::eq(|clue: &GameClue| clue.clue_id, clue_id)),
        |clue| clue.is_done = true,
    )
    .await
}

/// Flag the treasure of `game_id` as found; returns the rows updated.
pub async fn mark_treasure_found(stack: &PersistenceStack, game_id: i64) -> PersistenceResult<usize> {
    let worker = stack.worker();
    let _gate = worker.perform().await;
    update_objects(
        worker,
        &Filter::eq(|treasure: &GameTreasure| treasure.game_id, game_id),
        |treasure| treasure.is_found = true,
    )
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;

    use super::*;
    use crate::dao::disk_store::MemoryStore;

    // One degree of latitude is about 111 195 m on this sphere.
    const METRES_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

    fn north_of(origin: Coordinate, metres: f64) -> Coordinate {
        Coordinate::new(origin.latitude + metres / METRES_PER_DEGREE, origin.longitude)
    }

    async fn stack_with_game() -> PersistenceStack {
        let stack = PersistenceStack::with_store(Arc::new(MemoryStore::new()))
            .await
            .unwrap();
        let worker = stack.worker();
        for (clue_id, order, is_done) in [(11, 1, true), (12, 2, false), (13, 3, false)] {
            worker
                .insert(&GameClue {
                    game_id: 1,
                    clue_id,
                    order,
                    latitude: 14.6537,
                    longitude: 121.0687,
                    is_done,
                    ..GameClue::default()
                })
                .await
                .unwrap();
        }
        worker
            .insert(&GameTreasure {
                game_id: 1,
                treasure_id: 5,
                latitude: 14.6540,
                longitude: 121.0690,
                ..GameTreasure::default()
            })
            .await
            .unwrap();
        worker.save_cascade().await.unwrap();
        stack
    }

    #[test]
    fn haversine_matches_known_distance() {
        let origin = Coordinate::new(0.0, 0.0);
        let distance = haversine_distance(origin, Coordinate::new(1.0, 0.0));
        assert!((distance - METRES_PER_DEGREE).abs() < 1e-6);
        assert_eq!(haversine_distance(origin, origin), 0.0);
    }

    #[test]
    fn geofence_boundary_is_inclusive() {
        assert!(within_radius(30.0));
        assert!(within_radius(29.999));
        assert!(!within_radius(30.001));
    }

    #[tokio::test]
    async fn next_clue_skips_solved_ones() {
        let stack = stack_with_game().await;
        assert_eq!(next_clue_order(stack.main(), 1).await.unwrap(), Some(2));
        assert_eq!(next_clue_order(stack.main(), 9).await.unwrap(), None);

        mark_clue_done(&stack, 1, 12).await.unwrap();
        assert_eq!(next_clue_order(stack.main(), 1).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn clue_is_reached_inside_the_radius() {
        let stack = stack_with_game().await;
        let clue_spot = Coordinate::new(14.6537, 121.0687);

        let near = north_of(clue_spot, 29.0);
        let far = north_of(clue_spot, 31.0);
        assert!(retrieve_clue(stack.main(), near, 2, 1).await.unwrap().is_some());
        assert!(retrieve_clue(stack.main(), far, 2, 1).await.unwrap().is_none());
        assert!(retrieve_clue(stack.main(), near, 7, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn treasure_found_flag_is_saved() {
        let stack = stack_with_game().await;
        let spot = Coordinate::new(14.6540, 121.0690);
        let treasure = retrieve_treasure(stack.main(), spot, 1).await.unwrap().unwrap();
        assert!(!treasure.is_found);

        assert_eq!(mark_treasure_found(&stack, 1).await.unwrap(), 1);
        let treasure = retrieve_treasure(stack.main(), spot, 1).await.unwrap().unwrap();
        assert!(treasure.is_found);
    }

    #[tokio::test]
    async fn tracker_publishes_updates() {
        let tracker = LocationTracker::new();
        assert_eq!(tracker.current(), None);

        let mut stream = tracker.stream();
        assert_eq!(stream.next().await, Some(None));

        tracker.update(Coordinate::new(14.65, 121.07));
        assert_eq!(tracker.current(), Some(Coordinate::new(14.65, 121.07)));
        assert_eq!(stream.next().await, Some(Some(Coordinate::new(14.65, 121.07))));
    }
}
