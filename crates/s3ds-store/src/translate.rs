use crate::client::RemoteError;
use crate::error::DatastoreError;

/// Map a remote fault onto the datastore error taxonomy.
///
/// `NoSuchKey` (object fetch) and `NotFound` (metadata fetch) both become
/// [`DatastoreError::NotFound`]; everything else is carried through as
/// [`DatastoreError::Backend`] with the remote code and message.
pub fn translate(err: RemoteError) -> DatastoreError {
    if err.is_not_found() {
        DatastoreError::NotFound
    } else {
        DatastoreError::Backend(err.to_string())
    }
}

impl From<RemoteError> for DatastoreError {
    fn from(err: RemoteError) -> Self {
        translate(err)
    }
}
