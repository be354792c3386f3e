pub(super) const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS deposit_addresses (
   address          TEXT PRIMARY KEY NOT NULL,
   active           INTEGER NOT NULL DEFAULT 1,
   leased_to        TEXT,
   lease_expires_at INTEGER,
   created_at       INTEGER NOT NULL,
   CHECK ((leased_to IS NULL) = (lease_expires_at IS NULL))
);

-- one lease per identity; lapsed leases are cleared before a new claim
CREATE UNIQUE INDEX IF NOT EXISTS deposit_addresses_holder
   ON deposit_addresses (leased_to) WHERE leased_to IS NOT NULL;

CREATE TABLE IF NOT EXISTS items (
   id          TEXT PRIMARY KEY NOT NULL,
   owner       TEXT NOT NULL,
   price       INTEGER NOT NULL CHECK (price >= 0),
   status      TEXT NOT NULL CHECK (status IN ('listed', 'sold', 'withdrawn')),
   is_auction  INTEGER NOT NULL DEFAULT 0,
   auction_end INTEGER,
   current_bid INTEGER,
   updated_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ledger_entries (
   id         INTEGER PRIMARY KEY AUTOINCREMENT,
   account_id TEXT NOT NULL,
   amount     INTEGER NOT NULL CHECK (amount >= 0),
   item_id    TEXT,
   created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS ledger_entries_item ON ledger_entries (item_id);

CREATE TRIGGER IF NOT EXISTS ledger_entries_no_update
   BEFORE UPDATE ON ledger_entries
BEGIN
   SELECT RAISE(ABORT, 'ledger is append-only');
END;

CREATE TRIGGER IF NOT EXISTS ledger_entries_no_delete
   BEFORE DELETE ON ledger_entries
BEGIN
   SELECT RAISE(ABORT, 'ledger is append-only');
END;
";
