/*!
# Lead Sheet Import

Spreadsheet import, column mapping and outreach run tracking for a lead
management service, built in Rust.

## Overview

Users upload spreadsheets of leads, confirm how the columns map onto lead
fields, and later trigger bulk outreach actions over the imported rows. This
crate holds the part of that service with real data-transformation logic:
decoding uploads, matching headers against an alias table, projecting rows
into normalized records, and reporting the progress of bulk action runs to
polling clients.

## Architecture

Data flows leaf-first through four components:

- **Header Alias Resolver** (`aliases`) - maps raw headers onto canonical
  fields using an ordered, configurable alias table
- **Spreadsheet Parser** (`loader`) - decodes CSV, XLS and XLSX uploads into
  a header row plus data rows (first sheet only)
- **Row Mapper** (`mapper`) - resolves one column per field for the whole
  batch and projects every row into a `LeadRecord`
- **Action Run Tracker** (`runs`) - reports per-row statuses and whether a
  run is complete; completion is recomputed on every read

Around them sit the collaborators the service depends on:

- **store**: `LeadStore` trait and the file-backed `JsonStore`
- **sessions**: session lookup and the authentication middleware
- **config**: server flags and environment variables
- **app**: HTTP routes (`web` feature)

## Ownership

A lead sheet belongs to exactly one user and an action run to exactly one
sheet. Reads by anyone other than the owner fail exactly like reads of
entities that do not exist.

## REST API Endpoints

- `GET /api/fields` - Configured alias table
- `POST /api/mapping/suggest` - Suggest a column for every field
- `POST /api/uploads/headers` - Header row and suggestions for an upload
- `POST /api/leads` - Import an upload as a new lead sheet
- `GET /api/leads/{sheet}` - Read an owned lead sheet
- `GET /api/leads/{sheet}/runs/{run}` - Poll an action run
*/

pub mod aliases;
pub mod config;
pub mod error;
pub mod loader;
pub mod mapper;
pub mod runs;
pub mod sessions;
pub mod store;

#[cfg(feature = "web")]
pub mod app;

pub use aliases::{FieldTable, MappableField, MappingResult, resolve_index};
pub use error::{LeadError, Result};
pub use loader::{CellValue, ParsedSheet, SheetFormat, parse_first_row_headers};
pub use mapper::{ColumnPlan, LeadRecord, MappingSelection, map_rows};
pub use runs::{ActionRun, RunStatus, get_run_status};
pub use store::{JsonStore, LeadSheet, LeadStore};
