pub mod shares {
    pub const SELECT_COLUMNS: &str = r#"
    SELECT share_id
         , owner_id
         , guitar_id
         , is_active
         , shared_fields
         , selected_image_ids
         , optimized_images
         , view_count
         , views
         , last_viewed_at
         , created_at
         , updated_at
      FROM shares
    "#;

    pub const INSERT: &str = r#"
    INSERT INTO shares (
        share_id
      , owner_id
      , guitar_id
      , is_active
      , shared_fields
      , selected_image_ids
      , optimized_images
      , view_count
      , views
      , last_viewed_at
      , created_at
      , updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    "#;

    pub const WHERE_KEY: &str = "WHERE owner_id = ? AND share_id = ?";

    pub const WHERE_PUBLIC_ID: &str = "WHERE share_id = ?";

    pub const WHERE_OWNER: &str = "WHERE owner_id = ? ORDER BY created_at DESC";

    pub const INCREMENT_VIEW_COUNT: &str = r#"
    UPDATE shares
       SET view_count = view_count + 1
     WHERE owner_id = ?
       AND share_id = ?
    "#;

    pub const UPDATE_VIEWS: &str = r#"
    UPDATE shares
       SET views = ?
         , last_viewed_at = ?
     WHERE owner_id = ?
       AND share_id = ?
    "#;

    pub const DELETE: &str = r#"
    DELETE FROM shares
     WHERE owner_id = ?
       AND share_id = ?
    "#;
}

pub mod guitars {
    pub const SELECT_BY_KEY: &str = r#"
    SELECT data
      FROM guitars
     WHERE owner_id = ?
       AND guitar_id = ?
    "#;
}
