//! Notes and tags API service

use crate::error::ClientError;
use crate::filter::NoteFilter;
use crate::gateway::Gateway;
use crate::transport::ApiRequest;
use crate::types::{Note, NoteInput, Tag};

/// CRUD over notes, plus the tag list
#[derive(Clone)]
pub struct NotesService {
    gateway: Gateway,
}

impl NotesService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// All notes of the current user, newest first
    pub async fn list(&self) -> Result<Vec<Note>, ClientError> {
        self.gateway.send_json(&ApiRequest::get("/notes/")).await
    }

    /// Notes matching `filter`; filtering happens client-side
    pub async fn search(&self, filter: &NoteFilter) -> Result<Vec<Note>, ClientError> {
        let notes = self.list().await?;
        Ok(notes.into_iter().filter(|note| filter.matches(note)).collect())
    }

    pub async fn get(&self, id: u64) -> Result<Note, ClientError> {
        self.gateway.send_json(&ApiRequest::get(note_path(id))).await
    }

    pub async fn create(&self, note: &NoteInput) -> Result<Note, ClientError> {
        let request = ApiRequest::post("/notes/").json(note)?;
        self.gateway.send_json(&request).await
    }

    pub async fn update(&self, id: u64, note: &NoteInput) -> Result<Note, ClientError> {
        let request = ApiRequest::put(note_path(id)).json(note)?;
        self.gateway.send_json(&request).await
    }

    pub async fn delete(&self, id: u64) -> Result<(), ClientError> {
        self.gateway.send(&ApiRequest::delete(note_path(id))).await?;
        Ok(())
    }

    pub async fn tags(&self) -> Result<Vec<Tag>, ClientError> {
        self.gateway.send_json(&ApiRequest::get("/tags/")).await
    }
}

fn note_path(id: u64) -> String {
    format!("/note/{id}/")
}
