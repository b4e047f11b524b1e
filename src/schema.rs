// Mirrors migrations/2025-09-01-000000_create_booking/up.sql

diesel::table! {
    shops (id) {
        id -> Uuid,
        name -> Text,
        address -> Text,
        phone_number -> Text,
        tax_rate -> Float8,
    }
}

diesel::table! {
    shop_timings (id) {
        id -> Uuid,
        shop_id -> Uuid,
        day_of_week -> Text,
        open_time -> Text,
        close_time -> Text,
        is_closed -> Bool,
    }
}

diesel::table! {
    services (id) {
        id -> Uuid,
        name -> Text,
        duration -> Int4,
        price -> Float8,
    }
}

diesel::table! {
    barbers (id) {
        id -> Uuid,
        name -> Text,
        contact_info -> Nullable<Text>,
        shop_id -> Uuid,
    }
}

diesel::table! {
    schedules (id) {
        id -> Uuid,
        barber_id -> Uuid,
        shop_id -> Uuid,
        day_of_week -> Text,
        start_time -> Text,
        end_time -> Text,
        is_day_off -> Bool,
    }
}

diesel::table! {
    appointments (id) {
        id -> Uuid,
        shop_id -> Uuid,
        shop_name -> Text,
        barber_id -> Uuid,
        barber_name -> Text,
        customer_name -> Text,
        customer_phone -> Text,
        customer_gender -> Nullable<Text>,
        start_time -> Timestamptz,
        end_time -> Timestamptz,
        status -> Text,
        is_walk_in -> Bool,
        bill_amount -> Float8,
        tax_rate_snapshot -> Float8,
        total_amount -> Float8,
        services_snapshot -> Text,
    }
}
