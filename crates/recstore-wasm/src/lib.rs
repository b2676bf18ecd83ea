//! recstore WASM bridge
//!
//! Exposes the record store to browser JavaScript through wasm-bindgen:
//!
//! ```js
//! const db = new RecordStore("app", [
//!   { name: "users", key: "id", indexList: [
//!     { indexName: "by_email", keyPath: "email", objectParameters: { unique: true } },
//!   ] },
//! ]);
//! await db.open();
//! await db.set("users", { id: 1, email: "ada@example.com" }); // {code: 2000, message: ...}
//! const ada = await db.getByIndex("users", "by_email", "ada@example.com");
//! ```
//!
//! The JSON shapes live in [`payload`], which builds on every target.

pub mod payload;

#[cfg(feature = "browser")]
mod browser;

#[cfg(feature = "browser")]
pub use browser::RecordStore;
