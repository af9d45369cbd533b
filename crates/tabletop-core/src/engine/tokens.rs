//! Player commands creating and deleting tokens on the active scene.

use super::SyncEngine;
use crate::error::SyncResult;
use crate::geometry::position_on_circle;
use crate::images::{ImageStore, UploadedFile};
use crate::model::{BACKGROUND_SIZE, GameId, NewToken, Token, TokenId};
use crate::store::TokenStore;

/// Z-order slots just below and just above the existing tokens.
fn z_bounds(tokens: &[Token]) -> (i32, i32) {
    let Some(min) = tokens.iter().map(|t| t.zorder).min() else {
        return (-1, 1);
    };
    let max = tokens.iter().map(|t| t.zorder).max().unwrap_or(min);
    let bottom = match min.saturating_sub(1) {
        0 => -1,
        z => z,
    };
    (bottom, max.saturating_add(1))
}

impl<S: TokenStore, I: ImageStore> SyncEngine<S, I> {
    /// Store uploaded images and create one token per file around `(x, y)`.
    ///
    /// Small images become tokens on top; large ones become decorations at the
    /// bottom. The first token becomes the background if the scene has none.
    /// Files that cannot be stored are skipped.
    pub fn upload(&self, game: GameId, x: i32, y: i32, files: &[UploadedFile]) -> SyncResult<Vec<TokenId>> {
        self.exclusive(game, || {
            let scene = self.store.active_scene(game)?;
            let stamp = self.clock.now();
            self.store.touch_scene(scene.id, stamp)?;

            let (bottom, top) = z_bounds(&self.store.tokens(scene.id)?);
            let mut created = Vec::with_capacity(files.len());
            for (k, file) in files.iter().enumerate() {
                let url = match self.images.store(game, &file.name, &file.bytes) {
                    Ok(url) => url,
                    Err(e) => {
                        log::warn!("Skipping upload {} to game {}: {}", file.name, game, e);
                        continue;
                    }
                };
                let size = self.images.byte_size(&url)?;
                let (posx, posy) = position_on_circle((x, y), k, files.len());

                let mut new = NewToken::new(scene.id, url, posx, posy);
                if size < self.config.token_threshold_bytes {
                    new.zorder = top;
                } else {
                    new.size = self.config.decoration_size;
                    new.zorder = bottom;
                }
                let mut token = self.store.create_token(new, stamp)?;

                if self.store.scene(scene.id)?.backing.is_none() {
                    token.size = BACKGROUND_SIZE;
                    self.store.update_token(&token)?;
                    self.store.set_background(scene.id, Some(token.id))?;
                }
                created.push(token.id);
            }
            Ok(created)
        })
    }

    /// Duplicate tokens of the active scene around `(x, y)`.
    ///
    /// Clones of the background get the default size. Unknown ids are skipped.
    pub fn clone_tokens(&self, game: GameId, x: i32, y: i32, ids: &[TokenId]) -> SyncResult<Vec<TokenId>> {
        self.exclusive(game, || {
            let scene = self.store.active_scene(game)?;
            let stamp = self.clock.now();
            self.store.touch_scene(scene.id, stamp)?;

            let mut created = Vec::with_capacity(ids.len());
            for (k, id) in ids.iter().enumerate() {
                let Some(source) = self.store.token(scene.id, *id)? else {
                    log::debug!("Cannot clone token {}: not in scene {}", id, scene.id);
                    continue;
                };
                let (posx, posy) = position_on_circle((x, y), k, ids.len());
                let mut copy = NewToken::cloned_from(&source, posx, posy);
                copy.locked = false;
                if source.is_background() {
                    copy.size = Token::DEFAULT_SIZE;
                }
                created.push(self.store.create_token(copy, stamp)?.id);
            }
            Ok(created)
        })
    }

    /// Delete tokens of the active scene. Unknown ids are skipped.
    pub fn delete_tokens(&self, game: GameId, ids: &[TokenId]) -> SyncResult<()> {
        self.exclusive(game, || {
            let scene = self.store.active_scene(game)?;
            let stamp = self.clock.now();
            self.store.touch_scene(scene.id, stamp)?;

            for id in ids {
                if self.store.token(scene.id, *id)?.is_none() {
                    log::debug!("Cannot delete token {}: not in scene {}", id, scene.id);
                    continue;
                }
                if self.store.scene(scene.id)?.backing == Some(*id) {
                    self.store.set_background(scene.id, None)?;
                }
                self.store.delete_token(*id)?;
                self.removals.record(game, scene.id, *id, stamp);
            }
            Ok(())
        })
    }
}
