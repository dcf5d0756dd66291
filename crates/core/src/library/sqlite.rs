//! SQLite-backed media repository implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::release::{CandidateRelease, Quality};

use super::{
    Download, DownloadStatus, Episode, MediaRepository, Movie, MovieFile, MovieRequest,
    RepositoryError, Season, SeasonFile, SeasonRequest, Show,
};

/// SQLite-backed media repository.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(map_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory repository (useful for testing).
    pub fn in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(map_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS movies (
                id TEXT PRIMARY KEY,
                external_id INTEGER NOT NULL,
                metadata_provider TEXT NOT NULL,
                name TEXT NOT NULL,
                overview TEXT NOT NULL,
                year INTEGER,
                library TEXT NOT NULL,
                UNIQUE (external_id, metadata_provider)
            );

            CREATE TABLE IF NOT EXISTS shows (
                id TEXT PRIMARY KEY,
                external_id INTEGER NOT NULL,
                metadata_provider TEXT NOT NULL,
                name TEXT NOT NULL,
                overview TEXT NOT NULL,
                year INTEGER,
                ended INTEGER NOT NULL DEFAULT 0,
                continuous_download INTEGER NOT NULL DEFAULT 0,
                library TEXT NOT NULL,
                UNIQUE (external_id, metadata_provider)
            );

            CREATE TABLE IF NOT EXISTS seasons (
                id TEXT PRIMARY KEY,
                show_id TEXT NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
                number INTEGER NOT NULL,
                name TEXT NOT NULL,
                overview TEXT NOT NULL,
                external_id INTEGER NOT NULL,
                UNIQUE (show_id, number)
            );

            CREATE TABLE IF NOT EXISTS episodes (
                id TEXT PRIMARY KEY,
                season_id TEXT NOT NULL REFERENCES seasons(id) ON DELETE CASCADE,
                number INTEGER NOT NULL,
                external_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                UNIQUE (season_id, number)
            );

            CREATE TABLE IF NOT EXISTS movie_requests (
                id TEXT PRIMARY KEY,
                movie_id TEXT NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
                min_quality TEXT NOT NULL,
                wanted_quality TEXT NOT NULL,
                authorized INTEGER NOT NULL DEFAULT 0,
                requested_by TEXT,
                authorized_by TEXT,
                UNIQUE (movie_id, wanted_quality)
            );

            CREATE TABLE IF NOT EXISTS season_requests (
                id TEXT PRIMARY KEY,
                season_id TEXT NOT NULL REFERENCES seasons(id) ON DELETE CASCADE,
                min_quality TEXT NOT NULL,
                wanted_quality TEXT NOT NULL,
                authorized INTEGER NOT NULL DEFAULT 0,
                requested_by TEXT,
                authorized_by TEXT,
                UNIQUE (season_id, wanted_quality)
            );

            CREATE TABLE IF NOT EXISTS downloads (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                title TEXT NOT NULL,
                quality TEXT NOT NULL,
                imported INTEGER NOT NULL DEFAULT 0,
                hash TEXT NOT NULL,
                usenet INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS movie_files (
                movie_id TEXT NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
                quality TEXT NOT NULL,
                download_id TEXT REFERENCES downloads(id) ON DELETE CASCADE,
                file_path_suffix TEXT NOT NULL,
                PRIMARY KEY (movie_id, file_path_suffix),
                UNIQUE (movie_id, quality)
            );

            CREATE TABLE IF NOT EXISTS season_files (
                season_id TEXT NOT NULL REFERENCES seasons(id) ON DELETE CASCADE,
                quality TEXT NOT NULL,
                download_id TEXT REFERENCES downloads(id) ON DELETE CASCADE,
                file_path_suffix TEXT NOT NULL,
                PRIMARY KEY (season_id, file_path_suffix),
                UNIQUE (season_id, quality)
            );

            CREATE TABLE IF NOT EXISTS candidates (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                download_url TEXT NOT NULL,
                seeders INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL,
                usenet INTEGER NOT NULL,
                age_secs INTEGER NOT NULL,
                indexer TEXT,
                flags TEXT NOT NULL,
                score INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_movie_files_download ON movie_files(download_id);
            CREATE INDEX IF NOT EXISTS idx_season_files_download ON season_files(download_id);
            CREATE INDEX IF NOT EXISTS idx_candidates_created ON candidates(created_at);
            "#,
        )
        .map_err(map_err)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Database("connection mutex poisoned".to_string()))
    }

    fn load_seasons(conn: &Connection, show_id: &str) -> Result<Vec<Season>, RepositoryError> {
        let mut stmt = conn
            .prepare(
                "SELECT id, show_id, number, name, overview, external_id
                 FROM seasons WHERE show_id = ?1 ORDER BY number",
            )
            .map_err(map_err)?;
        let seasons = stmt
            .query_map(params![show_id], row_to_season)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;

        let mut episode_stmt = conn
            .prepare(
                "SELECT id, season_id, number, external_id, title
                 FROM episodes WHERE season_id = ?1 ORDER BY number",
            )
            .map_err(map_err)?;

        let mut loaded = Vec::with_capacity(seasons.len());
        for mut season in seasons {
            season.episodes = episode_stmt
                .query_map(params![season.id], row_to_episode)
                .map_err(map_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err)?;
            loaded.push(season);
        }
        Ok(loaded)
    }

    fn load_show(conn: &Connection, id: &str) -> Result<Show, RepositoryError> {
        let mut show = conn
            .query_row(
                "SELECT id, external_id, metadata_provider, name, overview, year, ended,
                        continuous_download, library
                 FROM shows WHERE id = ?1",
                params![id],
                row_to_show,
            )
            .optional()
            .map_err(map_err)?
            .ok_or_else(|| RepositoryError::not_found("show", id))?;
        show.seasons = Self::load_seasons(conn, &show.id)?;
        Ok(show)
    }
}

/// Map SQLite errors, singling out unique and primary-key violations.
fn map_err(e: rusqlite::Error) -> RepositoryError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &e {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return RepositoryError::Conflict(message.clone().unwrap_or_else(|| e.to_string()));
        }
    }
    RepositoryError::Database(e.to_string())
}

fn quality_column(row: &Row, idx: usize) -> rusqlite::Result<Quality> {
    let value: String = row.get(idx)?;
    Ok(value.parse().unwrap_or(Quality::Unknown))
}

fn row_to_movie(row: &Row) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: row.get(0)?,
        external_id: row.get(1)?,
        metadata_provider: row.get(2)?,
        name: row.get(3)?,
        overview: row.get(4)?,
        year: row.get(5)?,
        library: row.get(6)?,
    })
}

fn row_to_show(row: &Row) -> rusqlite::Result<Show> {
    Ok(Show {
        id: row.get(0)?,
        external_id: row.get(1)?,
        metadata_provider: row.get(2)?,
        name: row.get(3)?,
        overview: row.get(4)?,
        year: row.get(5)?,
        ended: row.get(6)?,
        continuous_download: row.get(7)?,
        library: row.get(8)?,
        seasons: Vec::new(),
    })
}

fn row_to_season(row: &Row) -> rusqlite::Result<Season> {
    Ok(Season {
        id: row.get(0)?,
        show_id: row.get(1)?,
        number: row.get(2)?,
        name: row.get(3)?,
        overview: row.get(4)?,
        external_id: row.get(5)?,
        episodes: Vec::new(),
    })
}

fn row_to_episode(row: &Row) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: row.get(0)?,
        season_id: row.get(1)?,
        number: row.get(2)?,
        external_id: row.get(3)?,
        title: row.get(4)?,
    })
}

fn row_to_movie_request(row: &Row) -> rusqlite::Result<MovieRequest> {
    Ok(MovieRequest {
        id: row.get(0)?,
        movie_id: row.get(1)?,
        min_quality: quality_column(row, 2)?,
        wanted_quality: quality_column(row, 3)?,
        authorized: row.get(4)?,
        requested_by: row.get(5)?,
        authorized_by: row.get(6)?,
    })
}

fn row_to_season_request(row: &Row) -> rusqlite::Result<SeasonRequest> {
    Ok(SeasonRequest {
        id: row.get(0)?,
        season_id: row.get(1)?,
        min_quality: quality_column(row, 2)?,
        wanted_quality: quality_column(row, 3)?,
        authorized: row.get(4)?,
        requested_by: row.get(5)?,
        authorized_by: row.get(6)?,
    })
}

fn row_to_download(row: &Row) -> rusqlite::Result<Download> {
    let status: String = row.get(1)?;
    Ok(Download {
        id: row.get(0)?,
        status: status.parse().unwrap_or(DownloadStatus::Unknown),
        title: row.get(2)?,
        quality: quality_column(row, 3)?,
        imported: row.get(4)?,
        hash: row.get(5)?,
        usenet: row.get(6)?,
    })
}

fn row_to_movie_file(row: &Row) -> rusqlite::Result<MovieFile> {
    Ok(MovieFile {
        movie_id: row.get(0)?,
        quality: quality_column(row, 1)?,
        download_id: row.get(2)?,
        file_path_suffix: row.get(3)?,
    })
}

fn row_to_season_file(row: &Row) -> rusqlite::Result<SeasonFile> {
    Ok(SeasonFile {
        season_id: row.get(0)?,
        quality: quality_column(row, 1)?,
        download_id: row.get(2)?,
        file_path_suffix: row.get(3)?,
    })
}

fn row_to_candidate(row: &Row) -> rusqlite::Result<CandidateRelease> {
    let flags_json: String = row.get(8)?;
    Ok(CandidateRelease {
        id: row.get(0)?,
        title: row.get(1)?,
        download_url: row.get(2)?,
        seeders: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)?.max(0) as u64,
        usenet: row.get(5)?,
        age_secs: row.get::<_, i64>(6)?.max(0) as u64,
        indexer: row.get(7)?,
        flags: serde_json::from_str(&flags_json).unwrap_or_default(),
        score: row.get(9)?,
    })
}

/// Fixed-width RFC 3339 so stored timestamps order as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const MOVIE_COLUMNS: &str = "id, external_id, metadata_provider, name, overview, year, library";
const REQUEST_COLUMNS: &str = "min_quality, wanted_quality, authorized, requested_by, authorized_by";
const DOWNLOAD_COLUMNS: &str = "id, status, title, quality, imported, hash, usenet";

impl MediaRepository for SqliteRepository {
    fn add_movie(&self, movie: &Movie) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO movies ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)", MOVIE_COLUMNS),
            params![
                movie.id,
                movie.external_id,
                movie.metadata_provider,
                movie.name,
                movie.overview,
                movie.year,
                movie.library
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn get_movie(&self, id: &str) -> Result<Movie, RepositoryError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM movies WHERE id = ?1", MOVIE_COLUMNS),
            params![id],
            row_to_movie,
        )
        .optional()
        .map_err(map_err)?
        .ok_or_else(|| RepositoryError::not_found("movie", id))
    }

    fn list_movies(&self) -> Result<Vec<Movie>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM movies ORDER BY name", MOVIE_COLUMNS))
            .map_err(map_err)?;
        let movies = stmt
            .query_map([], row_to_movie)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(movies)
    }

    fn add_show(&self, show: &Show) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(map_err)?;
        tx.execute(
            "INSERT INTO shows (id, external_id, metadata_provider, name, overview, year, ended,
                                continuous_download, library)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                show.id,
                show.external_id,
                show.metadata_provider,
                show.name,
                show.overview,
                show.year,
                show.ended,
                show.continuous_download,
                show.library
            ],
        )
        .map_err(map_err)?;

        for season in &show.seasons {
            tx.execute(
                "INSERT INTO seasons (id, show_id, number, name, overview, external_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    season.id,
                    show.id,
                    season.number,
                    season.name,
                    season.overview,
                    season.external_id
                ],
            )
            .map_err(map_err)?;

            for episode in &season.episodes {
                tx.execute(
                    "INSERT INTO episodes (id, season_id, number, external_id, title)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        episode.id,
                        season.id,
                        episode.number,
                        episode.external_id,
                        episode.title
                    ],
                )
                .map_err(map_err)?;
            }
        }

        tx.commit().map_err(map_err)
    }

    fn get_show(&self, id: &str) -> Result<Show, RepositoryError> {
        let conn = self.conn()?;
        Self::load_show(&conn, id)
    }

    fn list_shows(&self) -> Result<Vec<Show>, RepositoryError> {
        let conn = self.conn()?;
        let ids: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT id FROM shows ORDER BY name")
                .map_err(map_err)?;
            let ids = stmt
                .query_map([], |row| row.get(0))
                .map_err(map_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err)?;
            ids
        };
        ids.iter().map(|id| Self::load_show(&conn, id)).collect()
    }

    fn get_season(&self, season_id: &str) -> Result<Season, RepositoryError> {
        let show = self.get_show_by_season(season_id)?;
        show.seasons
            .into_iter()
            .find(|s| s.id == season_id)
            .ok_or_else(|| RepositoryError::not_found("season", season_id))
    }

    fn get_show_by_season(&self, season_id: &str) -> Result<Show, RepositoryError> {
        let conn = self.conn()?;
        let show_id: String = conn
            .query_row(
                "SELECT show_id FROM seasons WHERE id = ?1",
                params![season_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_err)?
            .ok_or_else(|| RepositoryError::not_found("season", season_id))?;
        Self::load_show(&conn, &show_id)
    }

    fn save_movie_request(&self, request: &MovieRequest) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO movie_requests (id, movie_id, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    movie_id = excluded.movie_id,
                    min_quality = excluded.min_quality,
                    wanted_quality = excluded.wanted_quality,
                    authorized = excluded.authorized,
                    requested_by = excluded.requested_by,
                    authorized_by = excluded.authorized_by",
                REQUEST_COLUMNS
            ),
            params![
                request.id,
                request.movie_id,
                request.min_quality.as_str(),
                request.wanted_quality.as_str(),
                request.authorized,
                request.requested_by,
                request.authorized_by
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn get_movie_request(&self, id: &str) -> Result<MovieRequest, RepositoryError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT id, movie_id, {} FROM movie_requests WHERE id = ?1",
                REQUEST_COLUMNS
            ),
            params![id],
            row_to_movie_request,
        )
        .optional()
        .map_err(map_err)?
        .ok_or_else(|| RepositoryError::not_found("movie request", id))
    }

    fn list_movie_requests(&self) -> Result<Vec<MovieRequest>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, movie_id, {} FROM movie_requests ORDER BY rowid",
                REQUEST_COLUMNS
            ))
            .map_err(map_err)?;
        let requests = stmt
            .query_map([], row_to_movie_request)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(requests)
    }

    fn delete_movie_request(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        let affected = conn
            .execute("DELETE FROM movie_requests WHERE id = ?1", params![id])
            .map_err(map_err)?;
        if affected == 0 {
            return Err(RepositoryError::not_found("movie request", id));
        }
        Ok(())
    }

    fn save_season_request(&self, request: &SeasonRequest) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO season_requests (id, season_id, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    season_id = excluded.season_id,
                    min_quality = excluded.min_quality,
                    wanted_quality = excluded.wanted_quality,
                    authorized = excluded.authorized,
                    requested_by = excluded.requested_by,
                    authorized_by = excluded.authorized_by",
                REQUEST_COLUMNS
            ),
            params![
                request.id,
                request.season_id,
                request.min_quality.as_str(),
                request.wanted_quality.as_str(),
                request.authorized,
                request.requested_by,
                request.authorized_by
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn get_season_request(&self, id: &str) -> Result<SeasonRequest, RepositoryError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT id, season_id, {} FROM season_requests WHERE id = ?1",
                REQUEST_COLUMNS
            ),
            params![id],
            row_to_season_request,
        )
        .optional()
        .map_err(map_err)?
        .ok_or_else(|| RepositoryError::not_found("season request", id))
    }

    fn list_season_requests(&self) -> Result<Vec<SeasonRequest>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, season_id, {} FROM season_requests ORDER BY rowid",
                REQUEST_COLUMNS
            ))
            .map_err(map_err)?;
        let requests = stmt
            .query_map([], row_to_season_request)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(requests)
    }

    fn delete_season_request(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        let affected = conn
            .execute("DELETE FROM season_requests WHERE id = ?1", params![id])
            .map_err(map_err)?;
        if affected == 0 {
            return Err(RepositoryError::not_found("season request", id));
        }
        Ok(())
    }

    fn save_download(&self, download: &Download) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO downloads ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    title = excluded.title,
                    quality = excluded.quality,
                    imported = excluded.imported,
                    hash = excluded.hash,
                    usenet = excluded.usenet",
                DOWNLOAD_COLUMNS
            ),
            params![
                download.id,
                download.status.as_str(),
                download.title,
                download.quality.as_str(),
                download.imported,
                download.hash,
                download.usenet
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn get_download(&self, id: &str) -> Result<Download, RepositoryError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM downloads WHERE id = ?1", DOWNLOAD_COLUMNS),
            params![id],
            row_to_download,
        )
        .optional()
        .map_err(map_err)?
        .ok_or_else(|| RepositoryError::not_found("download", id))
    }

    fn list_downloads(&self) -> Result<Vec<Download>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM downloads ORDER BY rowid",
                DOWNLOAD_COLUMNS
            ))
            .map_err(map_err)?;
        let downloads = stmt
            .query_map([], row_to_download)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(downloads)
    }

    fn delete_download(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        let affected = conn
            .execute("DELETE FROM downloads WHERE id = ?1", params![id])
            .map_err(map_err)?;
        if affected == 0 {
            return Err(RepositoryError::not_found("download", id));
        }
        Ok(())
    }

    fn add_movie_file(&self, file: &MovieFile) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO movie_files (movie_id, quality, download_id, file_path_suffix)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                file.movie_id,
                file.quality.as_str(),
                file.download_id,
                file.file_path_suffix
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn movie_files(&self, movie_id: &str) -> Result<Vec<MovieFile>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT movie_id, quality, download_id, file_path_suffix
                 FROM movie_files WHERE movie_id = ?1",
            )
            .map_err(map_err)?;
        let files = stmt
            .query_map(params![movie_id], row_to_movie_file)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(files)
    }

    fn movie_files_of_download(&self, download_id: &str) -> Result<Vec<MovieFile>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT movie_id, quality, download_id, file_path_suffix
                 FROM movie_files WHERE download_id = ?1",
            )
            .map_err(map_err)?;
        let files = stmt
            .query_map(params![download_id], row_to_movie_file)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(files)
    }

    fn add_season_file(&self, file: &SeasonFile) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO season_files (season_id, quality, download_id, file_path_suffix)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                file.season_id,
                file.quality.as_str(),
                file.download_id,
                file.file_path_suffix
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn season_files(&self, season_id: &str) -> Result<Vec<SeasonFile>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT season_id, quality, download_id, file_path_suffix
                 FROM season_files WHERE season_id = ?1",
            )
            .map_err(map_err)?;
        let files = stmt
            .query_map(params![season_id], row_to_season_file)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(files)
    }

    fn season_files_of_download(
        &self,
        download_id: &str,
    ) -> Result<Vec<SeasonFile>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT season_id, quality, download_id, file_path_suffix
                 FROM season_files WHERE download_id = ?1",
            )
            .map_err(map_err)?;
        let files = stmt
            .query_map(params![download_id], row_to_season_file)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(files)
    }

    fn save_candidate(&self, candidate: &CandidateRelease) -> Result<(), RepositoryError> {
        let flags = serde_json::to_string(&candidate.flags)
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO candidates (id, title, download_url, seeders, size_bytes, usenet, age_secs,
                                     indexer, flags, score, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET score = excluded.score",
            params![
                candidate.id,
                candidate.title,
                candidate.download_url,
                candidate.seeders,
                candidate.size_bytes as i64,
                candidate.usenet,
                candidate.age_secs as i64,
                candidate.indexer,
                flags,
                candidate.score,
                timestamp(Utc::now())
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn get_candidate(&self, id: &str) -> Result<CandidateRelease, RepositoryError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, title, download_url, seeders, size_bytes, usenet, age_secs, indexer, flags,
                    score
             FROM candidates WHERE id = ?1",
            params![id],
            row_to_candidate,
        )
        .optional()
        .map_err(map_err)?
        .ok_or_else(|| RepositoryError::not_found("candidate", id))
    }

    fn prune_candidates(&self, older_than: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM candidates WHERE created_at < ?1",
            params![timestamp(older_than)],
        )
        .map_err(map_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> SqliteRepository {
        SqliteRepository::in_memory().expect("in-memory repository")
    }

    #[test]
    fn test_movie_roundtrip_and_not_found() {
        let repo = repo();
        let movie = Movie::new(949, "tmdb", "Heat", Some(1995));
        repo.add_movie(&movie).unwrap();

        assert_eq!(repo.get_movie(&movie.id).unwrap(), movie);
        assert!(matches!(
            repo.get_movie("missing"),
            Err(RepositoryError::NotFound { kind: "movie", .. })
        ));
    }

    #[test]
    fn test_duplicate_movie_is_conflict() {
        let repo = repo();
        repo.add_movie(&Movie::new(949, "tmdb", "Heat", Some(1995)))
            .unwrap();
        let err = repo
            .add_movie(&Movie::new(949, "tmdb", "Heat again", Some(1995)))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        repo.add_movie(&Movie::new(949, "tvdb", "Heat", Some(1995)))
            .unwrap();
    }

    #[test]
    fn test_show_with_seasons_roundtrip() {
        let repo = repo();
        let show = Show::new(1, "tmdb", "Show", Some(2020))
            .with_season(2, 3)
            .with_season(1, 2);
        repo.add_show(&show).unwrap();

        let loaded = repo.get_show(&show.id).unwrap();
        assert_eq!(loaded.seasons.len(), 2);
        assert_eq!(loaded.seasons[0].number, 1);
        assert_eq!(loaded.seasons[1].episodes.len(), 3);

        let season_id = &show.season_by_number(2).unwrap().id;
        assert_eq!(repo.get_show_by_season(season_id).unwrap().id, show.id);
        assert_eq!(repo.get_season(season_id).unwrap().number, 2);
        assert_eq!(repo.list_shows().unwrap().len(), 1);
    }

    #[test]
    fn test_request_update_in_place() {
        let repo = repo();
        let movie = Movie::new(1, "tmdb", "Movie", None);
        repo.add_movie(&movie).unwrap();

        let mut request = MovieRequest::new(&movie.id, Quality::Sd, Quality::FullHd);
        repo.save_movie_request(&request).unwrap();

        request.authorized = true;
        request.authorized_by = Some("admin".to_string());
        repo.save_movie_request(&request).unwrap();

        let requests = repo.list_movie_requests().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, request.id);
        assert!(requests[0].authorized);

        repo.delete_movie_request(&request.id).unwrap();
        assert!(matches!(
            repo.delete_movie_request(&request.id),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_movie_file_quality_is_conflict() {
        let repo = repo();
        let movie = Movie::new(1, "tmdb", "Movie", None);
        repo.add_movie(&movie).unwrap();

        let file = MovieFile {
            movie_id: movie.id.clone(),
            quality: Quality::FullHd,
            download_id: None,
            file_path_suffix: String::new(),
        };
        repo.add_movie_file(&file).unwrap();

        let same_quality = MovieFile {
            file_path_suffix: "DIRECTORS CUT".to_string(),
            ..file.clone()
        };
        assert!(matches!(
            repo.add_movie_file(&same_quality),
            Err(RepositoryError::Conflict(_))
        ));

        let same_suffix = MovieFile {
            quality: Quality::Uhd,
            ..file
        };
        assert!(matches!(
            repo.add_movie_file(&same_suffix),
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    fn test_delete_download_cascades_to_slots() {
        let repo = repo();
        let show = Show::new(1, "tmdb", "Show", None).with_season(1, 1);
        repo.add_show(&show).unwrap();
        let season_id = show.seasons[0].id.clone();

        let download = Download::new("Show.S01.1080p", Quality::FullHd, "hash", false);
        repo.save_download(&download).unwrap();
        repo.add_season_file(&SeasonFile {
            season_id: season_id.clone(),
            quality: Quality::FullHd,
            download_id: Some(download.id.clone()),
            file_path_suffix: String::new(),
        })
        .unwrap();
        assert_eq!(repo.season_files_of_download(&download.id).unwrap().len(), 1);

        repo.delete_download(&download.id).unwrap();
        assert!(repo.season_files(&season_id).unwrap().is_empty());
        assert!(matches!(
            repo.get_download(&download.id),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_download_update() {
        let repo = repo();
        let mut download = Download::new("Movie.1080p", Quality::FullHd, "hash", false);
        repo.save_download(&download).unwrap();

        download.status = DownloadStatus::Finished;
        download.imported = true;
        repo.save_download(&download).unwrap();

        let loaded = repo.get_download(&download.id).unwrap();
        assert_eq!(loaded.status, DownloadStatus::Finished);
        assert!(loaded.imported);
        assert_eq!(repo.list_downloads().unwrap().len(), 1);
    }

    #[test]
    fn test_candidate_keeps_download_url() {
        let repo = repo();
        let candidate = CandidateRelease::torrent("Movie.1080p", "magnet:?xt=urn:btih:abc", 12)
            .with_flags(vec!["freeleech".to_string()])
            .with_indexer("tracker")
            .with_size(1024);
        repo.save_candidate(&candidate).unwrap();

        assert_eq!(repo.get_candidate(&candidate.id).unwrap(), candidate);
    }

    #[test]
    fn test_prune_candidates_drops_only_older_rows() {
        let repo = repo();
        let candidate = CandidateRelease::torrent("Movie.1080p", "magnet:?xt=urn:btih:abc", 12);
        repo.save_candidate(&candidate).unwrap();

        let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(repo.prune_candidates(an_hour_ago).unwrap(), 0);
        assert!(repo.get_candidate(&candidate.id).is_ok());

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(repo.prune_candidates(later).unwrap(), 1);
        assert!(matches!(
            repo.get_candidate(&candidate.id),
            Err(RepositoryError::NotFound { kind: "candidate", .. })
        ));
    }

    #[test]
    fn test_file_backed_repository_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("media.db");
        let movie = Movie::new(5, "tmdb", "Persisted", Some(2001));
        {
            let repo = SqliteRepository::new(&path).unwrap();
            repo.add_movie(&movie).unwrap();
        }
        let repo = SqliteRepository::new(&path).unwrap();
        assert_eq!(repo.list_movies().unwrap(), vec![movie]);
    }
}
