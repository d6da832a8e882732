//! Query and mutation documents sent to the Mobilizon `/api` endpoint.

pub const SEARCH_ADDRESS: &str = "query searchAddress($query: String!) { \
    searchAddress(query: $query) { id description locality postalCode street country region geom } }";

pub const SEARCH_EVENTS: &str = "query searchEvents($term: String, $beginsOn: DateTime) { \
    searchEvents(term: $term, beginsOn: $beginsOn) { total elements { id uuid title beginsOn } } }";

pub const FETCH_EVENT: &str =
    "query FetchEvent($uuid: UUID!) { event(uuid: $uuid) { id uuid onlineAddress } }";

pub const CREATE_EVENT: &str = "mutation createEvent(\
    $organizerActorId: ID!, $attributedToId: ID, $title: String!, $category: EventCategory, \
    $visibility: EventVisibility, $description: String!, $physicalAddress: AddressInput, \
    $beginsOn: DateTime!, $endsOn: DateTime, $draft: Boolean, $onlineAddress: String, \
    $externalParticipationUrl: String, $tags: [String], $joinOptions: EventJoinOptions, \
    $options: EventOptionsInput, $picture: MediaInput) { \
    createEvent(organizerActorId: $organizerActorId, attributedToId: $attributedToId, \
    title: $title, category: $category, visibility: $visibility, description: $description, \
    physicalAddress: $physicalAddress, beginsOn: $beginsOn, endsOn: $endsOn, draft: $draft, \
    onlineAddress: $onlineAddress, externalParticipationUrl: $externalParticipationUrl, \
    tags: $tags, joinOptions: $joinOptions, options: $options, picture: $picture) { id uuid } }";

pub const UPDATE_EVENT: &str = "mutation updateEvent(\
    $eventId: ID!, $organizerActorId: ID, $attributedToId: ID, $title: String, \
    $category: EventCategory, $visibility: EventVisibility, $description: String, \
    $physicalAddress: AddressInput, $beginsOn: DateTime, $endsOn: DateTime, $draft: Boolean, \
    $onlineAddress: String, $externalParticipationUrl: String, $tags: [String], \
    $joinOptions: EventJoinOptions, $options: EventOptionsInput, $picture: MediaInput) { \
    updateEvent(eventId: $eventId, organizerActorId: $organizerActorId, \
    attributedToId: $attributedToId, title: $title, category: $category, \
    visibility: $visibility, description: $description, physicalAddress: $physicalAddress, \
    beginsOn: $beginsOn, endsOn: $endsOn, draft: $draft, onlineAddress: $onlineAddress, \
    externalParticipationUrl: $externalParticipationUrl, tags: $tags, \
    joinOptions: $joinOptions, options: $options, picture: $picture) { id uuid } }";

pub const REFRESH_TOKEN: &str = "mutation refreshToken($refreshToken: String!) { \
    refreshToken(refreshToken: $refreshToken) { accessToken refreshToken } }";

pub const UPLOAD_MEDIA: &str = "mutation uploadMedia($file: Upload!, $name: String!) { \
    uploadMedia(file: $file, name: $name) { uuid } }";
