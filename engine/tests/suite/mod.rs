mod ingest;
mod reorder;
mod save;
mod undo;
mod workspace;
