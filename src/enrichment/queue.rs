// =============================================================================
// Persistent enrichment queue — survives process restarts
// =============================================================================
//
// Primary store is a Redis sorted set (score = sort_score) plus a hash with
// the serialised task bodies, both keyed by `address:STAGE` and written in
// one atomic pipeline. When Redis is unavailable, put/get degrade
// transparently to a bounded in-memory priority queue.
// =============================================================================

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::enrichment::stage::EnrichmentStage;
use crate::enrichment::task::{decode_sort_score, EnrichmentTask, PRIORITY_WEIGHT, STAGE_BUCKET_WEIGHT};

/// Sorted set: member = address:STAGE, score = sort_score.
const REDIS_KEY_QUEUE: &str = "enrichment:queue";
/// Hash: field = address:STAGE, value = task JSON.
const REDIS_KEY_TASKS: &str = "enrichment:tasks";

/// A task scheduled slightly in the future still pops within this grace.
const READY_GRACE_SEC: f64 = 2.0;
/// Sleep between polls when nothing is ready.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Queue clock: wall seconds. scheduled_at values must stay comparable
/// across restarts because they persist in Redis.
pub fn queue_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

struct HeapEntry {
    score: f64,
    task: EnrichmentTask,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

struct FallbackQueue {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    keys: HashSet<String>,
}

pub struct PersistentEnrichmentQueue {
    redis: Option<redis::Client>,
    fallback: Mutex<FallbackQueue>,
    maxsize: usize,
}

impl PersistentEnrichmentQueue {
    pub fn new(redis: Option<redis::Client>, maxsize: usize) -> Self {
        Self {
            redis,
            fallback: Mutex::new(FallbackQueue {
                heap: BinaryHeap::new(),
                keys: HashSet::new(),
            }),
            maxsize,
        }
    }

    // -------------------------------------------------------------------------
    // put
    // -------------------------------------------------------------------------

    /// Enqueue a task, deduplicating by `(address, stage)`.
    ///
    /// With `allow_update` the existing entry is overwritten (stage
    /// progression); without it a duplicate key is dropped silently (dedup
    /// between discovery sources).
    pub async fn put(&self, task: EnrichmentTask, allow_update: bool) {
        if let Some(client) = &self.redis {
            match self.redis_put(client, &task, allow_update).await {
                Ok(()) => return,
                Err(e) => {
                    debug!(error = %e, "queue: redis put failed, using fallback");
                }
            }
        }
        self.fallback_put(task, allow_update);
    }

    async fn redis_put(
        &self,
        client: &redis::Client,
        task: &EnrichmentTask,
        allow_update: bool,
    ) -> redis::RedisResult<()> {
        let mut con = client.get_async_connection().await?;
        let tid = task.task_id();
        if !allow_update {
            let existing: Option<f64> = con.zscore(REDIS_KEY_QUEUE, &tid).await?;
            if existing.is_some() {
                debug!(task = %tid, "queue: dedup, already queued");
                return Ok(());
            }
        }
        let body = serde_json::to_string(task).unwrap_or_default();
        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(REDIS_KEY_QUEUE)
            .arg(task.sort_score())
            .arg(&tid)
            .ignore()
            .cmd("HSET")
            .arg(REDIS_KEY_TASKS)
            .arg(&tid)
            .arg(body)
            .ignore()
            .query_async(&mut con)
            .await
    }

    fn fallback_put(&self, task: EnrichmentTask, allow_update: bool) {
        let mut fallback = self.fallback.lock();
        let tid = task.task_id();
        if fallback.keys.contains(&tid) {
            if !allow_update {
                debug!(task = %tid, "queue: dedup (fallback), already queued");
                return;
            }
            // Replace: drop the stale entry lazily by rebuilding without it.
            let entries: Vec<Reverse<HeapEntry>> = fallback
                .heap
                .drain()
                .filter(|Reverse(e)| e.task.task_id() != tid)
                .collect();
            fallback.heap = entries.into_iter().collect();
            fallback.keys.remove(&tid);
        }
        if fallback.heap.len() >= self.maxsize {
            warn!(task = %tid, "queue: full, dropping task");
            return;
        }
        fallback.keys.insert(tid);
        fallback.heap.push(Reverse(HeapEntry {
            score: task.sort_score(),
            task,
        }));
    }

    // -------------------------------------------------------------------------
    // get
    // -------------------------------------------------------------------------

    /// Block until a ready task (`scheduled_at <= now + grace`) is available.
    pub async fn get(&self) -> EnrichmentTask {
        loop {
            if let Some(task) = self.poll_ready().await {
                return task;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// One non-blocking attempt to pop the highest-priority ready task.
    pub async fn poll_ready(&self) -> Option<EnrichmentTask> {
        if let Some(client) = &self.redis {
            match self.try_redis_get(client).await {
                Ok(found) => {
                    if found.is_some() {
                        return found;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "queue: redis get failed");
                }
            }
        }
        self.fallback_pop_ready()
    }

    async fn try_redis_get(
        &self,
        client: &redis::Client,
    ) -> redis::RedisResult<Option<EnrichmentTask>> {
        let mut con = client.get_async_connection().await?;
        let now = queue_now();
        // Maximum score covering every ready task: normal priority, PRE_SCAN
        // bucket, scheduled_at <= now.
        let max_score = PRIORITY_WEIGHT + STAGE_BUCKET_WEIGHT + now;

        let ids: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(REDIS_KEY_QUEUE)
            .arg("-inf")
            .arg(max_score)
            .arg("LIMIT")
            .arg(0)
            .arg(1)
            .query_async(&mut con)
            .await?;
        let Some(tid) = ids.into_iter().next() else {
            return Ok(None);
        };

        let score: Option<f64> = con.zscore(REDIS_KEY_QUEUE, &tid).await?;
        let Some(score) = score else {
            return Ok(None);
        };
        let (_, _, scheduled_at) = decode_sort_score(score);
        if scheduled_at - now > READY_GRACE_SEC {
            return Ok(None);
        }

        // Pop atomically; another worker may win the race.
        let removed: i64 = con.zrem(REDIS_KEY_QUEUE, &tid).await?;
        if removed == 0 {
            return Ok(None);
        }
        let body: Option<String> = con.hget(REDIS_KEY_TASKS, &tid).await?;
        let _: () = con.hdel(REDIS_KEY_TASKS, &tid).await?;
        let Some(body) = body else {
            return Ok(None);
        };
        match serde_json::from_str(&body) {
            Ok(task) => Ok(Some(task)),
            Err(e) => {
                warn!(task = %tid, error = %e, "queue: dropping malformed task body");
                Ok(None)
            }
        }
    }

    fn fallback_pop_ready(&self) -> Option<EnrichmentTask> {
        let mut fallback = self.fallback.lock();
        let now = queue_now();
        let ready = fallback
            .heap
            .peek()
            .is_some_and(|Reverse(e)| e.task.scheduled_at - now <= READY_GRACE_SEC);
        if !ready {
            return None;
        }
        let Reverse(entry) = fallback.heap.pop()?;
        fallback.keys.remove(&entry.task.task_id());
        Some(entry.task)
    }

    // -------------------------------------------------------------------------
    // Administrative
    // -------------------------------------------------------------------------

    /// Approximate queue size.
    pub async fn size(&self) -> usize {
        if let Some(client) = &self.redis {
            if let Ok(mut con) = client.get_async_connection().await {
                if let Ok(count) = con.zcard::<_, i64>(REDIS_KEY_QUEUE).await {
                    return count as usize;
                }
            }
        }
        self.fallback.lock().heap.len()
    }

    /// Startup recovery: count persisted tasks, purge stale entries, and
    /// rescore everything under the current formula.
    pub async fn recover(&self) -> (usize, usize, usize) {
        let recovered = self.size().await;
        if recovered > 0 {
            info!(recovered, "queue: recovered pending tasks from Redis");
        }
        let purged = self.purge_stale().await;
        let migrated = self.migrate_scores().await;
        (recovered, purged, migrated)
    }

    /// Bulk-remove stale tasks. PRE_SCAN ages out after 5 minutes, INITIAL
    /// after 15, everything else after 3x its stage offset. Malformed
    /// entries are removed as well. Returns the number purged.
    pub async fn purge_stale(&self) -> usize {
        let Some(client) = &self.redis else {
            return 0;
        };
        let Ok(mut con) = client.get_async_connection().await else {
            return 0;
        };
        let Ok(all) = con
            .hgetall::<_, Vec<(String, String)>>(REDIS_KEY_TASKS)
            .await
        else {
            return 0;
        };

        let now = queue_now();
        let mut to_remove: Vec<String> = Vec::new();
        for (tid, body) in &all {
            match serde_json::from_str::<EnrichmentTask>(body) {
                Ok(task) => {
                    let max_age = task.stage.staleness_limit_sec() as f64;
                    if now - task.scheduled_at > max_age {
                        to_remove.push(tid.clone());
                    }
                }
                Err(_) => to_remove.push(tid.clone()),
            }
        }
        if to_remove.is_empty() {
            return 0;
        }

        let result: redis::RedisResult<()> = redis::pipe()
            .atomic()
            .cmd("ZREM")
            .arg(REDIS_KEY_QUEUE)
            .arg(&to_remove)
            .ignore()
            .cmd("HDEL")
            .arg(REDIS_KEY_TASKS)
            .arg(&to_remove)
            .ignore()
            .query_async(&mut con)
            .await;
        match result {
            Ok(()) => {
                info!(purged = to_remove.len(), total = all.len(), "queue: purged stale tasks");
                to_remove.len()
            }
            Err(e) => {
                warn!(error = %e, "queue: purge failed");
                0
            }
        }
    }

    /// Re-score every persisted task with the current sort formula. Needed
    /// after formula changes across versions. Returns the number migrated.
    pub async fn migrate_scores(&self) -> usize {
        let Some(client) = &self.redis else {
            return 0;
        };
        let Ok(mut con) = client.get_async_connection().await else {
            return 0;
        };
        let Ok(all) = con
            .hgetall::<_, Vec<(String, String)>>(REDIS_KEY_TASKS)
            .await
        else {
            return 0;
        };
        if all.is_empty() {
            return 0;
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut migrated = 0;
        for (tid, body) in &all {
            // Malformed tasks are skipped here; purge_stale removes them.
            if let Ok(task) = serde_json::from_str::<EnrichmentTask>(body) {
                pipe.cmd("ZADD")
                    .arg(REDIS_KEY_QUEUE)
                    .arg(task.sort_score())
                    .arg(tid)
                    .ignore();
                migrated += 1;
            }
        }
        if migrated == 0 {
            return 0;
        }
        let result: redis::RedisResult<()> = pipe.query_async(&mut con).await;
        match result {
            Ok(()) => {
                info!(migrated, "queue: migrated task scores");
                migrated
            }
            Err(e) => {
                warn!(error = %e, "queue: score migration failed");
                0
            }
        }
    }

    /// Whether EnrichmentStage-keyed entries exist for the address.
    pub async fn contains(&self, address: &str, stage: EnrichmentStage) -> bool {
        let tid = format!("{address}:{stage}");
        if let Some(client) = &self.redis {
            if let Ok(mut con) = client.get_async_connection().await {
                if let Ok(score) = con.zscore::<_, _, Option<f64>>(REDIS_KEY_QUEUE, &tid).await {
                    return score.is_some();
                }
            }
        }
        self.fallback.lock().keys.contains(&tid)
    }
}
