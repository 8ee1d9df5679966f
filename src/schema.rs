// Kept in sync by hand with `store::sqlite::MIGRATIONS`.

diesel::table! {
    users (email) {
        email -> Text,
        name -> Text,
        role -> Text,
        department -> Text,
        section -> Text,
        year -> Text,
        credential_state -> Text,
    }
}

diesel::table! {
    events (id) {
        id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        venue -> Nullable<Text>,
        organizer -> Text,
        from_date -> Timestamp,
        to_date -> Timestamp,
        created_by -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    od_requests (id) {
        id -> Text,
        student_email -> Text,
        student_name -> Text,
        student_department -> Text,
        student_section -> Text,
        event_id -> Nullable<Text>,
        event_name -> Text,
        from_date -> Date,
        to_date -> Date,
        attachment_data -> Nullable<Text>,
        attachment_mime -> Nullable<Text>,
        attachment_name -> Nullable<Text>,
        status -> Text,
        created_at -> Timestamp,
        approved_by -> Nullable<Text>,
        approved_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    attendance (student_email, date) {
        student_email -> Text,
        date -> Date,
        student_name -> Text,
        student_department -> Text,
        student_section -> Text,
        status -> Text,
        event_id -> Nullable<Text>,
        event_name -> Nullable<Text>,
        event_venue -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        marked_by -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(attendance, events, od_requests, users,);
