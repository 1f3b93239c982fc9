// =============================================================================
// Persistence — SQLite storage for tokens, snapshots, signals, trades,
// positions, and copy-trading wallets
// =============================================================================
//
// One WAL-mode connection behind a mutex. Schema is created idempotently at
// startup; all writes are idempotent upserts or append-only inserts. Monetary
// values are stored as decimal TEXT to keep precision through restarts.
// =============================================================================

pub mod rows;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::info;

use rows::{
    CreatorProfileRow, OutcomeRow, PositionRow, SecurityRow, SignalRow, SnapshotRow,
    TokenRow, TopHolderDbRow, TradeRow, TrackedWalletRow,
};

pub struct Database {
    conn: Mutex<Connection>,
}

// --- column codec helpers ---

fn d2s(v: Option<Decimal>) -> Option<String> {
    v.map(|d| d.to_string())
}

fn s2d(v: Option<String>) -> Option<Decimal> {
    v.and_then(|s| s.parse().ok())
}

fn t2s(v: Option<DateTime<Utc>>) -> Option<String> {
    v.map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
}

fn s2t(v: Option<String>) -> Option<DateTime<Utc>> {
    v.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    })
}

fn b2i(v: Option<bool>) -> Option<i64> {
    v.map(i64::from)
}

fn i2b(v: Option<i64>) -> Option<bool> {
    v.map(|i| i != 0)
}

fn now_s() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

impl Database {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("open database {path}"))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::init_schema(&conn)?;
        info!(path, "database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tokens (
                id INTEGER PRIMARY KEY,
                address TEXT NOT NULL,
                chain TEXT NOT NULL DEFAULT 'sol',
                name TEXT,
                symbol TEXT,
                source TEXT,
                creator_address TEXT,
                initial_buy_sol TEXT,
                initial_mcap_sol TEXT,
                bonding_curve_key TEXT,
                website TEXT,
                twitter TEXT,
                telegram TEXT,
                first_seen_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS uq_tokens_address_chain
                ON tokens(address, chain);
            CREATE INDEX IF NOT EXISTS idx_tokens_creator ON tokens(creator_address);

            CREATE TABLE IF NOT EXISTS token_snapshots (
                id INTEGER PRIMARY KEY,
                token_id INTEGER NOT NULL REFERENCES tokens(id),
                stage TEXT NOT NULL,
                price TEXT,
                market_cap TEXT,
                liquidity_usd TEXT,
                volume_5m TEXT,
                volume_1h TEXT,
                volume_24h TEXT,
                holders_count INTEGER,
                top10_holders_pct TEXT,
                dev_holds_pct TEXT,
                smart_wallets_count INTEGER,
                buys_5m INTEGER,
                sells_5m INTEGER,
                buys_1h INTEGER,
                sells_1h INTEGER,
                buys_24h INTEGER,
                sells_24h INTEGER,
                volatility_5m REAL,
                lp_removed_pct REAL,
                dex_price TEXT,
                dex_liquidity_usd TEXT,
                dex_volume_5m TEXT,
                dex_volume_1h TEXT,
                dex_volume_24h TEXT,
                jupiter_price TEXT,
                holder_growth_pct REAL,
                llm_risk_score INTEGER,
                score INTEGER,
                score_v3 INTEGER,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_token_time
                ON token_snapshots(token_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_snapshots_token_stage
                ON token_snapshots(token_id, stage);

            CREATE TABLE IF NOT EXISTS token_security (
                token_id INTEGER PRIMARY KEY REFERENCES tokens(id),
                is_mintable INTEGER,
                lp_burned INTEGER,
                lp_locked INTEGER,
                lp_lock_duration_days INTEGER,
                contract_renounced INTEGER,
                is_honeypot INTEGER,
                buy_tax TEXT,
                sell_tax TEXT,
                top10_holders_pct TEXT,
                dev_holds_pct TEXT,
                dev_token_balance TEXT,
                rugcheck_score INTEGER,
                rugcheck_score_max INTEGER,
                rugcheck_risks TEXT,
                bundled_buy_detected INTEGER,
                lp_burned_pct_raydium TEXT,
                checked_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS token_top_holders (
                id INTEGER PRIMARY KEY,
                snapshot_id INTEGER NOT NULL REFERENCES token_snapshots(id) ON DELETE CASCADE,
                token_id INTEGER NOT NULL REFERENCES tokens(id),
                rank INTEGER NOT NULL,
                address TEXT NOT NULL,
                balance TEXT,
                percentage TEXT,
                pnl TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_top_holders_snapshot
                ON token_top_holders(snapshot_id);

            CREATE TABLE IF NOT EXISTS token_outcomes (
                token_id INTEGER PRIMARY KEY REFERENCES tokens(id),
                initial_mcap TEXT,
                peak_mcap TEXT,
                peak_price TEXT,
                peak_multiplier TEXT,
                time_to_peak_sec INTEGER,
                final_mcap TEXT,
                final_multiplier TEXT,
                is_rug INTEGER,
                outcome_stage TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS creator_profiles (
                id INTEGER PRIMARY KEY,
                address TEXT NOT NULL UNIQUE,
                total_launches INTEGER NOT NULL DEFAULT 0,
                rugged_count INTEGER NOT NULL DEFAULT 0,
                success_count INTEGER NOT NULL DEFAULT 0,
                avg_peak_multiplier TEXT,
                risk_score INTEGER,
                funding_risk_score INTEGER,
                pumpfun_dead_tokens INTEGER,
                last_launch_at TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY,
                token_id INTEGER NOT NULL REFERENCES tokens(id),
                token_address TEXT NOT NULL,
                status TEXT NOT NULL,
                score INTEGER,
                net_score INTEGER,
                rules_fired TEXT,
                price TEXT,
                market_cap TEXT,
                liquidity_usd TEXT,
                peak_multiplier_after TEXT,
                peak_roi_pct TEXT,
                is_rug_after INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS uq_signals_token_status_active
                ON signals(token_id, status)
                WHERE status IN ('strong_buy','buy','watch');

            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY,
                signal_id INTEGER REFERENCES signals(id),
                token_id INTEGER NOT NULL REFERENCES tokens(id),
                token_address TEXT NOT NULL,
                side TEXT NOT NULL,
                amount_sol TEXT,
                amount_token TEXT,
                price TEXT,
                slippage_pct TEXT,
                fee_sol TEXT,
                tx_hash TEXT,
                is_paper INTEGER NOT NULL DEFAULT 1,
                source TEXT NOT NULL DEFAULT 'signal',
                copied_from_wallet TEXT,
                status TEXT NOT NULL DEFAULT 'filled',
                executed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_time ON trades(executed_at);

            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY,
                signal_id INTEGER REFERENCES signals(id),
                token_id INTEGER NOT NULL REFERENCES tokens(id),
                token_address TEXT NOT NULL,
                symbol TEXT,
                entry_price TEXT,
                current_price TEXT,
                amount_token TEXT,
                amount_sol_invested TEXT,
                pnl_pct TEXT NOT NULL DEFAULT '0',
                pnl_usd TEXT NOT NULL DEFAULT '0',
                max_price TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                close_reason TEXT,
                is_paper INTEGER NOT NULL DEFAULT 1,
                is_micro_entry INTEGER NOT NULL DEFAULT 0,
                source TEXT NOT NULL DEFAULT 'signal',
                copied_from_wallet TEXT,
                opened_at TEXT NOT NULL,
                closed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status);
            CREATE INDEX IF NOT EXISTS idx_positions_token_status
                ON positions(token_id, status);
            CREATE UNIQUE INDEX IF NOT EXISTS uq_positions_open_paper
                ON positions(token_id, is_paper, source)
                WHERE status = 'open';

            CREATE TABLE IF NOT EXISTS tracked_wallets (
                address TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                multiplier REAL NOT NULL DEFAULT 1.0,
                max_sol_per_trade REAL NOT NULL DEFAULT 0.05
            );",
        )
        .context("create schema")?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Tokens
    // -------------------------------------------------------------------------

    /// Insert or additively update a token; returns the surrogate id.
    /// Existing non-null columns are never overwritten with nulls.
    pub fn upsert_token(&self, token: &TokenRow) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tokens (address, chain, name, symbol, source, creator_address,
                                 initial_buy_sol, initial_mcap_sol, bonding_curve_key,
                                 website, twitter, telegram, first_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(address, chain) DO UPDATE SET
                 name = COALESCE(excluded.name, name),
                 symbol = COALESCE(excluded.symbol, symbol),
                 source = COALESCE(tokens.source, excluded.source),
                 creator_address = COALESCE(excluded.creator_address, creator_address),
                 initial_buy_sol = COALESCE(excluded.initial_buy_sol, initial_buy_sol),
                 initial_mcap_sol = COALESCE(excluded.initial_mcap_sol, initial_mcap_sol),
                 bonding_curve_key = COALESCE(excluded.bonding_curve_key, bonding_curve_key),
                 website = COALESCE(excluded.website, website),
                 twitter = COALESCE(excluded.twitter, twitter),
                 telegram = COALESCE(excluded.telegram, telegram)",
            params![
                token.address,
                token.chain,
                token.name,
                token.symbol,
                token.source,
                token.creator_address,
                d2s(token.initial_buy_sol),
                d2s(token.initial_mcap_sol),
                token.bonding_curve_key,
                token.website,
                token.twitter,
                token.telegram,
                t2s(token.first_seen_at).unwrap_or_else(now_s),
            ],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM tokens WHERE address = ?1 AND chain = ?2",
            params![token.address, token.chain],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn token_by_address(&self, address: &str) -> Result<Option<TokenRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, address, chain, name, symbol, source, creator_address,
                        initial_buy_sol, initial_mcap_sol, bonding_curve_key,
                        website, twitter, telegram, first_seen_at
                 FROM tokens WHERE address = ?1",
                params![address],
                Self::map_token,
            )
            .optional()?;
        Ok(row)
    }

    pub fn token_by_id(&self, id: i64) -> Result<Option<TokenRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, address, chain, name, symbol, source, creator_address,
                        initial_buy_sol, initial_mcap_sol, bonding_curve_key,
                        website, twitter, telegram, first_seen_at
                 FROM tokens WHERE id = ?1",
                params![id],
                Self::map_token,
            )
            .optional()?;
        Ok(row)
    }

    fn map_token(r: &Row<'_>) -> rusqlite::Result<TokenRow> {
        Ok(TokenRow {
            id: r.get(0)?,
            address: r.get(1)?,
            chain: r.get(2)?,
            name: r.get(3)?,
            symbol: r.get(4)?,
            source: r.get(5)?,
            creator_address: r.get(6)?,
            initial_buy_sol: s2d(r.get(7)?),
            initial_mcap_sol: s2d(r.get(8)?),
            bonding_curve_key: r.get(9)?,
            website: r.get(10)?,
            twitter: r.get(11)?,
            telegram: r.get(12)?,
            first_seen_at: s2t(r.get(13)?),
        })
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    pub fn insert_snapshot(&self, snap: &SnapshotRow) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO token_snapshots (
                token_id, stage, price, market_cap, liquidity_usd,
                volume_5m, volume_1h, volume_24h, holders_count,
                top10_holders_pct, dev_holds_pct, smart_wallets_count,
                buys_5m, sells_5m, buys_1h, sells_1h, buys_24h, sells_24h,
                volatility_5m, lp_removed_pct,
                dex_price, dex_liquidity_usd, dex_volume_5m, dex_volume_1h,
                dex_volume_24h, jupiter_price, holder_growth_pct, llm_risk_score,
                score, score_v3, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                     ?27, ?28, ?29, ?30, ?31)",
            params![
                snap.token_id,
                snap.stage,
                d2s(snap.price),
                d2s(snap.market_cap),
                d2s(snap.liquidity_usd),
                d2s(snap.volume_5m),
                d2s(snap.volume_1h),
                d2s(snap.volume_24h),
                snap.holders_count,
                d2s(snap.top10_holders_pct),
                d2s(snap.dev_holds_pct),
                snap.smart_wallets_count,
                snap.buys_5m,
                snap.sells_5m,
                snap.buys_1h,
                snap.sells_1h,
                snap.buys_24h,
                snap.sells_24h,
                snap.volatility_5m,
                snap.lp_removed_pct,
                d2s(snap.dex_price),
                d2s(snap.dex_liquidity_usd),
                d2s(snap.dex_volume_5m),
                d2s(snap.dex_volume_1h),
                d2s(snap.dex_volume_24h),
                d2s(snap.jupiter_price),
                snap.holder_growth_pct,
                snap.llm_risk_score,
                snap.score,
                snap.score_v3,
                t2s(snap.timestamp).unwrap_or_else(now_s),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The most recent snapshot for a token (readers filter by MAX(id)).
    pub fn latest_snapshot(&self, token_id: i64) -> Result<Option<SnapshotRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM token_snapshots WHERE token_id = ?1
                     ORDER BY id DESC LIMIT 1",
                    Self::SNAPSHOT_COLS
                ),
                params![token_id],
                Self::map_snapshot,
            )
            .optional()?;
        Ok(row)
    }

    const SNAPSHOT_COLS: &'static str = "id, token_id, stage, price, market_cap, liquidity_usd, \
        volume_5m, volume_1h, volume_24h, holders_count, top10_holders_pct, dev_holds_pct, \
        smart_wallets_count, buys_5m, sells_5m, buys_1h, sells_1h, buys_24h, sells_24h, \
        volatility_5m, lp_removed_pct, dex_price, dex_liquidity_usd, dex_volume_5m, \
        dex_volume_1h, dex_volume_24h, jupiter_price, holder_growth_pct, llm_risk_score, \
        score, score_v3, timestamp";

    fn map_snapshot(r: &Row<'_>) -> rusqlite::Result<SnapshotRow> {
        Ok(SnapshotRow {
            id: r.get(0)?,
            token_id: r.get(1)?,
            stage: r.get(2)?,
            price: s2d(r.get(3)?),
            market_cap: s2d(r.get(4)?),
            liquidity_usd: s2d(r.get(5)?),
            volume_5m: s2d(r.get(6)?),
            volume_1h: s2d(r.get(7)?),
            volume_24h: s2d(r.get(8)?),
            holders_count: r.get(9)?,
            top10_holders_pct: s2d(r.get(10)?),
            dev_holds_pct: s2d(r.get(11)?),
            smart_wallets_count: r.get(12)?,
            buys_5m: r.get(13)?,
            sells_5m: r.get(14)?,
            buys_1h: r.get(15)?,
            sells_1h: r.get(16)?,
            buys_24h: r.get(17)?,
            sells_24h: r.get(18)?,
            volatility_5m: r.get(19)?,
            lp_removed_pct: r.get(20)?,
            dex_price: s2d(r.get(21)?),
            dex_liquidity_usd: s2d(r.get(22)?),
            dex_volume_5m: s2d(r.get(23)?),
            dex_volume_1h: s2d(r.get(24)?),
            dex_volume_24h: s2d(r.get(25)?),
            jupiter_price: s2d(r.get(26)?),
            holder_growth_pct: r.get(27)?,
            llm_risk_score: r.get(28)?,
            score: r.get(29)?,
            score_v3: r.get(30)?,
            timestamp: s2t(r.get(31)?),
        })
    }

    // -------------------------------------------------------------------------
    // Security
    // -------------------------------------------------------------------------

    pub fn upsert_security(&self, sec: &SecurityRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO token_security (
                token_id, is_mintable, lp_burned, lp_locked, lp_lock_duration_days,
                contract_renounced, is_honeypot, buy_tax, sell_tax,
                top10_holders_pct, dev_holds_pct, dev_token_balance,
                rugcheck_score, rugcheck_score_max, rugcheck_risks,
                bundled_buy_detected, lp_burned_pct_raydium, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18)
             ON CONFLICT(token_id) DO UPDATE SET
                 is_mintable = COALESCE(excluded.is_mintable, is_mintable),
                 lp_burned = COALESCE(excluded.lp_burned, lp_burned),
                 lp_locked = COALESCE(excluded.lp_locked, lp_locked),
                 lp_lock_duration_days = COALESCE(excluded.lp_lock_duration_days, lp_lock_duration_days),
                 contract_renounced = COALESCE(excluded.contract_renounced, contract_renounced),
                 is_honeypot = COALESCE(excluded.is_honeypot, is_honeypot),
                 buy_tax = COALESCE(excluded.buy_tax, buy_tax),
                 sell_tax = COALESCE(excluded.sell_tax, sell_tax),
                 top10_holders_pct = COALESCE(excluded.top10_holders_pct, top10_holders_pct),
                 dev_holds_pct = COALESCE(excluded.dev_holds_pct, dev_holds_pct),
                 dev_token_balance = COALESCE(excluded.dev_token_balance, dev_token_balance),
                 rugcheck_score = COALESCE(excluded.rugcheck_score, rugcheck_score),
                 rugcheck_score_max = MAX(COALESCE(excluded.rugcheck_score_max, 0),
                                          COALESCE(token_security.rugcheck_score_max, 0)),
                 rugcheck_risks = COALESCE(excluded.rugcheck_risks, rugcheck_risks),
                 bundled_buy_detected = COALESCE(excluded.bundled_buy_detected, bundled_buy_detected),
                 lp_burned_pct_raydium = COALESCE(excluded.lp_burned_pct_raydium, lp_burned_pct_raydium),
                 checked_at = excluded.checked_at",
            params![
                sec.token_id,
                b2i(sec.is_mintable),
                b2i(sec.lp_burned),
                b2i(sec.lp_locked),
                sec.lp_lock_duration_days,
                b2i(sec.contract_renounced),
                b2i(sec.is_honeypot),
                d2s(sec.buy_tax),
                d2s(sec.sell_tax),
                d2s(sec.top10_holders_pct),
                d2s(sec.dev_holds_pct),
                d2s(sec.dev_token_balance),
                sec.rugcheck_score,
                sec.rugcheck_score_max.or(sec.rugcheck_score),
                sec.rugcheck_risks,
                b2i(sec.bundled_buy_detected),
                d2s(sec.lp_burned_pct_raydium),
                now_s(),
            ],
        )?;
        Ok(())
    }

    pub fn security(&self, token_id: i64) -> Result<Option<SecurityRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT token_id, is_mintable, lp_burned, lp_locked, lp_lock_duration_days,
                        contract_renounced, is_honeypot, buy_tax, sell_tax,
                        top10_holders_pct, dev_holds_pct, dev_token_balance,
                        rugcheck_score, rugcheck_score_max, rugcheck_risks,
                        bundled_buy_detected, lp_burned_pct_raydium
                 FROM token_security WHERE token_id = ?1",
                params![token_id],
                |r| {
                    Ok(SecurityRow {
                        token_id: r.get(0)?,
                        is_mintable: i2b(r.get(1)?),
                        lp_burned: i2b(r.get(2)?),
                        lp_locked: i2b(r.get(3)?),
                        lp_lock_duration_days: r.get(4)?,
                        contract_renounced: i2b(r.get(5)?),
                        is_honeypot: i2b(r.get(6)?),
                        buy_tax: s2d(r.get(7)?),
                        sell_tax: s2d(r.get(8)?),
                        top10_holders_pct: s2d(r.get(9)?),
                        dev_holds_pct: s2d(r.get(10)?),
                        dev_token_balance: s2d(r.get(11)?),
                        rugcheck_score: r.get(12)?,
                        rugcheck_score_max: r.get(13)?,
                        rugcheck_risks: r.get(14)?,
                        bundled_buy_detected: i2b(r.get(15)?),
                        lp_burned_pct_raydium: s2d(r.get(16)?),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // -------------------------------------------------------------------------
    // Top holders
    // -------------------------------------------------------------------------

    pub fn insert_top_holders(&self, holders: &[TopHolderDbRow]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for h in holders {
            tx.execute(
                "INSERT INTO token_top_holders
                     (snapshot_id, token_id, rank, address, balance, percentage, pnl)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    h.snapshot_id,
                    h.token_id,
                    h.rank,
                    h.address,
                    d2s(h.balance),
                    d2s(h.percentage),
                    d2s(h.pnl),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Outcomes
    // -------------------------------------------------------------------------

    pub fn upsert_outcome(&self, outcome: &OutcomeRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO token_outcomes (
                token_id, initial_mcap, peak_mcap, peak_price, peak_multiplier,
                time_to_peak_sec, final_mcap, final_multiplier, is_rug,
                outcome_stage, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(token_id) DO UPDATE SET
                 initial_mcap = COALESCE(token_outcomes.initial_mcap, excluded.initial_mcap),
                 peak_mcap = COALESCE(excluded.peak_mcap, peak_mcap),
                 peak_price = COALESCE(excluded.peak_price, peak_price),
                 peak_multiplier = COALESCE(excluded.peak_multiplier, peak_multiplier),
                 time_to_peak_sec = COALESCE(excluded.time_to_peak_sec, time_to_peak_sec),
                 final_mcap = COALESCE(excluded.final_mcap, final_mcap),
                 final_multiplier = COALESCE(excluded.final_multiplier, final_multiplier),
                 is_rug = COALESCE(excluded.is_rug, is_rug),
                 outcome_stage = COALESCE(excluded.outcome_stage, outcome_stage),
                 updated_at = excluded.updated_at",
            params![
                outcome.token_id,
                d2s(outcome.initial_mcap),
                d2s(outcome.peak_mcap),
                d2s(outcome.peak_price),
                d2s(outcome.peak_multiplier),
                outcome.time_to_peak_sec,
                d2s(outcome.final_mcap),
                d2s(outcome.final_multiplier),
                b2i(outcome.is_rug),
                outcome.outcome_stage,
                now_s(),
            ],
        )?;
        Ok(())
    }

    pub fn outcome(&self, token_id: i64) -> Result<Option<OutcomeRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT token_id, initial_mcap, peak_mcap, peak_price, peak_multiplier,
                        time_to_peak_sec, final_mcap, final_multiplier, is_rug, outcome_stage
                 FROM token_outcomes WHERE token_id = ?1",
                params![token_id],
                |r| {
                    Ok(OutcomeRow {
                        token_id: r.get(0)?,
                        initial_mcap: s2d(r.get(1)?),
                        peak_mcap: s2d(r.get(2)?),
                        peak_price: s2d(r.get(3)?),
                        peak_multiplier: s2d(r.get(4)?),
                        time_to_peak_sec: r.get(5)?,
                        final_mcap: s2d(r.get(6)?),
                        final_multiplier: s2d(r.get(7)?),
                        is_rug: i2b(r.get(8)?),
                        outcome_stage: r.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // -------------------------------------------------------------------------
    // Creator profiles
    // -------------------------------------------------------------------------

    pub fn upsert_creator_profile(&self, profile: &CreatorProfileRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO creator_profiles (
                address, total_launches, rugged_count, success_count,
                avg_peak_multiplier, risk_score, funding_risk_score,
                pumpfun_dead_tokens, last_launch_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(address) DO UPDATE SET
                 total_launches = excluded.total_launches,
                 rugged_count = excluded.rugged_count,
                 success_count = excluded.success_count,
                 avg_peak_multiplier = COALESCE(excluded.avg_peak_multiplier, avg_peak_multiplier),
                 risk_score = COALESCE(excluded.risk_score, risk_score),
                 funding_risk_score = COALESCE(excluded.funding_risk_score, funding_risk_score),
                 pumpfun_dead_tokens = COALESCE(excluded.pumpfun_dead_tokens, pumpfun_dead_tokens),
                 last_launch_at = COALESCE(excluded.last_launch_at, last_launch_at),
                 updated_at = excluded.updated_at",
            params![
                profile.address,
                profile.total_launches,
                profile.rugged_count,
                profile.success_count,
                d2s(profile.avg_peak_multiplier),
                profile.risk_score,
                profile.funding_risk_score,
                profile.pumpfun_dead_tokens,
                t2s(profile.last_launch_at),
                now_s(),
            ],
        )?;
        Ok(())
    }

    pub fn creator_profile(&self, address: &str) -> Result<Option<CreatorProfileRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT address, total_launches, rugged_count, success_count,
                        avg_peak_multiplier, risk_score, funding_risk_score,
                        pumpfun_dead_tokens, last_launch_at
                 FROM creator_profiles WHERE address = ?1",
                params![address],
                |r| {
                    Ok(CreatorProfileRow {
                        address: r.get(0)?,
                        total_launches: r.get(1)?,
                        rugged_count: r.get(2)?,
                        success_count: r.get(3)?,
                        avg_peak_multiplier: s2d(r.get(4)?),
                        risk_score: r.get(5)?,
                        funding_risk_score: r.get(6)?,
                        pumpfun_dead_tokens: r.get(7)?,
                        last_launch_at: s2t(r.get(8)?),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // -------------------------------------------------------------------------
    // Signals
    // -------------------------------------------------------------------------

    /// Persist a signal, expiring any active signal of the same status for
    /// the token first so the partial unique index is never violated. Both
    /// steps run in one transaction. Returns the new signal id.
    pub fn record_signal(&self, signal: &SignalRow) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE signals SET status = 'expired', updated_at = ?3
             WHERE token_id = ?1 AND status = ?2",
            params![signal.token_id, signal.status, now_s()],
        )?;
        tx.execute(
            "INSERT INTO signals (
                token_id, token_address, status, score, net_score, rules_fired,
                price, market_cap, liquidity_usd, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                signal.token_id,
                signal.token_address,
                signal.status,
                signal.score,
                signal.net_score,
                signal.rules_fired,
                d2s(signal.price),
                d2s(signal.market_cap),
                d2s(signal.liquidity_usd),
                now_s(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    pub fn active_signal(&self, token_id: i64, status: &str) -> Result<Option<SignalRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, token_id, token_address, status, score, net_score, rules_fired,
                        price, market_cap, liquidity_usd, peak_multiplier_after,
                        peak_roi_pct, is_rug_after, created_at, updated_at
                 FROM signals WHERE token_id = ?1 AND status = ?2",
                params![token_id, status],
                Self::map_signal,
            )
            .optional()?;
        Ok(row)
    }

    fn map_signal(r: &Row<'_>) -> rusqlite::Result<SignalRow> {
        Ok(SignalRow {
            id: r.get(0)?,
            token_id: r.get(1)?,
            token_address: r.get(2)?,
            status: r.get(3)?,
            score: r.get(4)?,
            net_score: r.get(5)?,
            rules_fired: r.get(6)?,
            price: s2d(r.get(7)?),
            market_cap: s2d(r.get(8)?),
            liquidity_usd: s2d(r.get(9)?),
            peak_multiplier_after: s2d(r.get(10)?),
            peak_roi_pct: s2d(r.get(11)?),
            is_rug_after: i2b(r.get(12)?),
            created_at: s2t(r.get(13)?),
            updated_at: s2t(r.get(14)?),
        })
    }

    /// Mirror peak/rug outcome data onto every signal row of a token.
    pub fn update_signal_outcomes(
        &self,
        token_id: i64,
        peak_multiplier: Option<Decimal>,
        peak_roi_pct: Option<Decimal>,
        is_rug: Option<bool>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE signals SET
                 peak_multiplier_after = COALESCE(?2, peak_multiplier_after),
                 peak_roi_pct = COALESCE(?3, peak_roi_pct),
                 is_rug_after = COALESCE(?4, is_rug_after)
             WHERE token_id = ?1",
            params![
                token_id,
                d2s(peak_multiplier),
                d2s(peak_roi_pct),
                b2i(is_rug)
            ],
        )?;
        Ok(())
    }

    /// Expire conflicting target-status rows, then downgrade matching source
    /// rows, in one transaction. Used by the signal decay sweep. Returns the
    /// number of downgraded rows.
    pub fn expire_then_downgrade(
        &self,
        from_status: &str,
        to_status: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let cutoff_s = cutoff.to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        tx.execute(
            "UPDATE signals SET status = 'expired', updated_at = ?3
             WHERE status = ?2 AND token_id IN (
                 SELECT token_id FROM signals WHERE status = ?1 AND updated_at < ?4
             )",
            params![from_status, to_status, now_s(), cutoff_s],
        )?;
        let changed = tx.execute(
            "UPDATE signals SET status = ?2, updated_at = ?3
             WHERE status = ?1 AND updated_at < ?4",
            params![from_status, to_status, now_s(), cutoff_s],
        )?;
        tx.commit()?;
        Ok(changed)
    }

    // -------------------------------------------------------------------------
    // Trades
    // -------------------------------------------------------------------------

    pub fn insert_trade(&self, trade: &TradeRow) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO trades (
                signal_id, token_id, token_address, side, amount_sol, amount_token,
                price, slippage_pct, fee_sol, tx_hash, is_paper, source,
                copied_from_wallet, status, executed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                trade.signal_id,
                trade.token_id,
                trade.token_address,
                trade.side,
                d2s(trade.amount_sol),
                d2s(trade.amount_token),
                d2s(trade.price),
                d2s(trade.slippage_pct),
                d2s(trade.fee_sol),
                trade.tx_hash,
                trade.is_paper,
                trade.source,
                trade.copied_from_wallet,
                trade.status,
                t2s(trade.executed_at).unwrap_or_else(now_s),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // -------------------------------------------------------------------------
    // Positions
    // -------------------------------------------------------------------------

    /// Insert a new open position. Returns `None` when the partial unique
    /// index rejects a concurrent duplicate — expected dedup, not an error.
    pub fn insert_position(&self, pos: &PositionRow) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO positions (
                signal_id, token_id, token_address, symbol, entry_price,
                current_price, amount_token, amount_sol_invested, pnl_pct, pnl_usd,
                max_price, status, close_reason, is_paper, is_micro_entry, source,
                copied_from_wallet, opened_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18, ?19)",
            params![
                pos.signal_id,
                pos.token_id,
                pos.token_address,
                pos.symbol,
                d2s(pos.entry_price),
                d2s(pos.current_price),
                d2s(pos.amount_token),
                d2s(pos.amount_sol_invested),
                pos.pnl_pct.to_string(),
                pos.pnl_usd.to_string(),
                d2s(pos.max_price),
                pos.status,
                pos.close_reason,
                pos.is_paper,
                pos.is_micro_entry,
                pos.source,
                pos.copied_from_wallet,
                t2s(pos.opened_at).unwrap_or_else(now_s),
                t2s(pos.closed_at),
            ],
        );
        match result {
            Ok(_) => Ok(Some(conn.last_insert_rowid())),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist every mutable field of a position in place.
    pub fn update_position(&self, pos: &PositionRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE positions SET
                signal_id = ?2, entry_price = ?3, current_price = ?4,
                amount_token = ?5, amount_sol_invested = ?6, pnl_pct = ?7,
                pnl_usd = ?8, max_price = ?9, status = ?10, close_reason = ?11,
                is_micro_entry = ?12, opened_at = COALESCE(?13, opened_at),
                closed_at = ?14
             WHERE id = ?1",
            params![
                pos.id,
                pos.signal_id,
                d2s(pos.entry_price),
                d2s(pos.current_price),
                d2s(pos.amount_token),
                d2s(pos.amount_sol_invested),
                pos.pnl_pct.to_string(),
                pos.pnl_usd.to_string(),
                d2s(pos.max_price),
                pos.status,
                pos.close_reason,
                pos.is_micro_entry,
                t2s(pos.opened_at),
                t2s(pos.closed_at),
            ],
        )?;
        Ok(())
    }

    const POSITION_COLS: &'static str = "id, signal_id, token_id, token_address, symbol, \
        entry_price, current_price, amount_token, amount_sol_invested, pnl_pct, pnl_usd, \
        max_price, status, close_reason, is_paper, is_micro_entry, source, \
        copied_from_wallet, opened_at, closed_at";

    fn map_position(r: &Row<'_>) -> rusqlite::Result<PositionRow> {
        Ok(PositionRow {
            id: r.get(0)?,
            signal_id: r.get(1)?,
            token_id: r.get(2)?,
            token_address: r.get(3)?,
            symbol: r.get(4)?,
            entry_price: s2d(r.get(5)?),
            current_price: s2d(r.get(6)?),
            amount_token: s2d(r.get(7)?),
            amount_sol_invested: s2d(r.get(8)?),
            pnl_pct: s2d(r.get(9)?).unwrap_or_default(),
            pnl_usd: s2d(r.get(10)?).unwrap_or_default(),
            max_price: s2d(r.get(11)?),
            status: r.get(12)?,
            close_reason: r.get(13)?,
            is_paper: r.get(14)?,
            is_micro_entry: r.get(15)?,
            source: r.get(16)?,
            copied_from_wallet: r.get(17)?,
            opened_at: s2t(r.get(18)?),
            closed_at: s2t(r.get(19)?),
        })
    }

    /// The single open position for `(token, paper-flag, source)`, if any.
    pub fn open_position(
        &self,
        token_id: i64,
        is_paper: i64,
        source: &str,
    ) -> Result<Option<PositionRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM positions
                     WHERE token_id = ?1 AND is_paper = ?2 AND source = ?3
                       AND status = 'open'",
                    Self::POSITION_COLS
                ),
                params![token_id, is_paper, source],
                Self::map_position,
            )
            .optional()?;
        Ok(row)
    }

    /// All open positions for a token matching the paper flag and source.
    pub fn open_positions_for_token(
        &self,
        token_id: i64,
        is_paper: Option<i64>,
        source: &str,
    ) -> Result<Vec<PositionRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM positions
             WHERE token_id = ?1 AND source = ?2 AND status = 'open'
               AND (?3 IS NULL OR is_paper = ?3)",
            Self::POSITION_COLS
        ))?;
        let rows = stmt
            .query_map(params![token_id, source, is_paper], Self::map_position)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Open copy-trade positions mirrored from a specific wallet.
    pub fn open_copy_positions(
        &self,
        token_address: &str,
        wallet: &str,
    ) -> Result<Vec<PositionRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM positions
             WHERE token_address = ?1 AND source = 'copy_trade'
               AND copied_from_wallet = ?2 AND status = 'open'",
            Self::POSITION_COLS
        ))?;
        let rows = stmt
            .query_map(params![token_address, wallet], Self::map_position)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_open_positions(
        &self,
        is_paper: i64,
        source: Option<&str>,
        micro_only: bool,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM positions
             WHERE status = 'open' AND is_paper = ?1
               AND (?2 IS NULL OR source = ?2)
               AND (?3 = 0 OR is_micro_entry = 1)",
            params![is_paper, source, micro_only as i64],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    pub fn total_open_exposure(&self, is_paper: i64) -> Result<Decimal> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT amount_sol_invested FROM positions
             WHERE status = 'open' AND is_paper = ?1",
        )?;
        let rows = stmt
            .query_map(params![is_paper], |r| r.get::<_, Option<String>>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter_map(s2d)
            .fold(Decimal::ZERO, |acc, v| acc + v))
    }

    /// Open positions older than `cutoff`, optionally filtered by paper flag
    /// and source.
    pub fn stale_open_positions(
        &self,
        cutoff: DateTime<Utc>,
        is_paper: Option<i64>,
        source: Option<&str>,
    ) -> Result<Vec<PositionRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM positions
             WHERE status = 'open' AND opened_at < ?1
               AND (?2 IS NULL OR is_paper = ?2)
               AND (?3 IS NULL OR source = ?3)",
            Self::POSITION_COLS
        ))?;
        let cutoff_s = cutoff.to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        let rows = stmt
            .query_map(params![cutoff_s, is_paper, source], Self::map_position)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn positions_with_status(&self, status: &str, is_paper: i64) -> Result<Vec<PositionRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM positions WHERE status = ?1 AND is_paper = ?2",
            Self::POSITION_COLS
        ))?;
        let rows = stmt
            .query_map(params![status, is_paper], Self::map_position)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Tracked wallets
    // -------------------------------------------------------------------------

    pub fn load_tracked_wallets(&self) -> Result<Vec<TrackedWalletRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT address, label, enabled, multiplier, max_sol_per_trade FROM tracked_wallets",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(TrackedWalletRow {
                    address: r.get(0)?,
                    label: r.get(1)?,
                    enabled: r.get::<_, i64>(2)? != 0,
                    multiplier: r.get(3)?,
                    max_sol_per_trade: r.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn upsert_tracked_wallet(&self, wallet: &TrackedWalletRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tracked_wallets (address, label, enabled, multiplier, max_sol_per_trade)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(address) DO UPDATE SET
                 label = excluded.label,
                 enabled = excluded.enabled,
                 multiplier = excluded.multiplier,
                 max_sol_per_trade = excluded.max_sol_per_trade",
            params![
                wallet.address,
                wallet.label,
                wallet.enabled as i64,
                wallet.multiplier,
                wallet.max_sol_per_trade,
            ],
        )?;
        Ok(())
    }

    pub fn delete_tracked_wallet(&self, address: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM tracked_wallets WHERE address = ?1", params![address])?;
        Ok(changed > 0)
    }
}
