//! The three association demonstrations, run in a fixed order.
//!
//! Each demo declares its own entity shapes and relationship, recreates its
//! tables destructively, inserts fixture rows, and reads them back with and
//! without eager loading. They share one database handle and run to
//! completion one after another; the first failure stops the sequence.

use async_trait::async_trait;

use crate::error::Result;
use crate::store::Database;

pub mod many_to_many;
pub mod one_to_many;
pub mod one_to_one;

/// A self-contained association demonstration.
#[async_trait]
pub trait AssociationDemo {
    fn name(&self) -> &'static str;

    async fn run(&self, db: &Database) -> Result<()>;
}

/// All demos, in execution order.
pub fn all() -> Vec<Box<dyn AssociationDemo + Send + Sync>> {
    vec![
        Box::new(one_to_one::OneToOne),
        Box::new(one_to_many::OneToMany),
        Box::new(many_to_many::ManyToMany),
    ]
}

/// Run every demo sequentially, stopping at the first error.
pub async fn run_all(db: &Database) -> Result<()> {
    for demo in all() {
        tracing::info!("running {} demo", demo.name());
        demo.run(db).await?;
    }
    Ok(())
}
